//! Incident notifications
//!
//! The notification gate runs detached from the reconciliation path. Its
//! failures are visible in logs only; nothing is returned to the caller.

use futures::future::join_all;
use orderheal_core::{Order, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    events::ErrorInfo,
    ports::{IncidentChannel, StoreRepository},
};

/// Incident payload sent to every channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub title: String,
    pub description: String,
    pub services: Vec<String>,
    pub task_list: String,
}

pub struct NotificationGate {
    stores: Arc<dyn StoreRepository>,
    channels: Vec<Arc<dyn IncidentChannel>>,
    timeout_sentinel: String,
    task_list: String,
}

impl NotificationGate {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        channels: Vec<Arc<dyn IncidentChannel>>,
        timeout_sentinel: &str,
        task_list: &str,
    ) -> Self {
        Self {
            stores,
            channels,
            timeout_sentinel: timeout_sentinel.to_string(),
            task_list: task_list.to_string(),
        }
    }

    /// Timeouts are expected noise and never escalated
    pub fn is_suppressed(&self, error: &ErrorInfo) -> bool {
        error.is_timeout(&self.timeout_sentinel)
    }

    /// Run [`maybe_notify`](Self::maybe_notify) as a detached task
    pub fn spawn(self: &Arc<Self>, order: Order, error: ErrorInfo) {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            gate.maybe_notify(&order, &error).await;
        });
    }

    pub async fn maybe_notify(&self, order: &Order, error: &ErrorInfo) {
        if self.is_suppressed(error) {
            debug!(pos_order_id = %order.pos_order_id, "Timeout error, notification suppressed");
            return;
        }

        if self.channels.is_empty() {
            debug!("No incident channels configured");
            return;
        }

        let store = match self.stores.find_by_id(&order.restaurant_id).await {
            Ok(Some(store)) => store,
            Ok(None) => {
                warn!(store_id = %order.restaurant_id, "Store not found, incident not sent");
                return;
            }
            Err(e) => {
                error!(store_id = %order.restaurant_id, error = %e, "Store lookup failed, incident not sent");
                return;
            }
        };

        let incident = self.build_incident(&store, order, error);

        let sends = self.channels.iter().map(|channel| {
            let incident = &incident;
            async move { (channel.name(), channel.create(incident).await) }
        });

        for (channel, result) in join_all(sends).await {
            match result {
                Ok(()) => info!(
                    channel = %channel,
                    pos_order_id = %order.pos_order_id,
                    "Incident created"
                ),
                Err(e) => warn!(
                    channel = %channel,
                    pos_order_id = %order.pos_order_id,
                    error = %e,
                    "Failed to create incident"
                ),
            }
        }
    }

    pub fn build_incident(&self, store: &Store, order: &Order, error: &ErrorInfo) -> Incident {
        let title = format!("Order error in {}: {}", store.name, error.code);

        let mut description = format!(
            "Store: {}\nAddress: {}\nPOS organization: {}\nOrder: {} (POS {})\nDelivery service: {}\nError code: {}\nError message: {}",
            store.name,
            store.address,
            store.pos_organization_id,
            order.id,
            order.pos_order_id,
            order.delivery_service,
            error.code,
            error.message_text(),
        );

        if !order.fail_reason.is_empty() {
            description.push_str(&format!(
                "\nReason: {}\nSolution: {}",
                order.fail_reason.reason, order.fail_reason.solution
            ));
        }

        Incident {
            title,
            description,
            services: self
                .channels
                .iter()
                .map(|c| c.service_id().to_string())
                .collect(),
            task_list: self.task_list.clone(),
        }
    }
}
