//! Order-status forwarding
//!
//! After every reconciliation the resulting status is pushed downstream,
//! either straight into the order repository for a fixed set of delivery
//! services or through the order-status API for everything else.

use orderheal_core::Order;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::{
    events::{EventInfo, OrderContext},
    ports::{OrderRepository, OrderStatusSink},
    Result,
};

pub struct StatusForwarder {
    orders: Arc<dyn OrderRepository>,
    sink: Arc<dyn OrderStatusSink>,
    direct_services: HashSet<String>,
}

impl StatusForwarder {
    pub fn new<I>(orders: Arc<dyn OrderRepository>, sink: Arc<dyn OrderStatusSink>, direct_services: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            orders,
            sink,
            direct_services: direct_services
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    pub fn is_direct(&self, delivery_service: &str) -> bool {
        self.direct_services.contains(&delivery_service.to_lowercase())
    }

    pub async fn forward(&self, order: &Order, info: &EventInfo, ctx: OrderContext) -> Result<()> {
        if self.is_direct(&order.delivery_service) {
            debug!(
                order_id = %order.id,
                status = %order.status,
                "Updating order status in repository"
            );
            self.orders.update_status(&order.id, order.status).await
        } else {
            debug!(
                order_id = %order.id,
                delivery_service = %order.delivery_service,
                "Forwarding order status to status API"
            );
            self.sink.forward(info, ctx).await
        }
    }
}
