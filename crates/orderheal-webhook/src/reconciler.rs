//! Order reconciliation
//!
//! Decides, per webhook event, whether the POS really created the order,
//! whether a failure is worth retrying and what the local order record
//! should say afterwards. The order record is written once per call.

use orderheal_core::{Order, OrderStatus, ReconcileConfig, Store};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    classifier::{ClassifyError, ErrorClassifier},
    events::{CreationStatus, ErrorInfo, EventInfo, OrderContext, WebhookEvent},
    notify::NotificationGate,
    ports::{OrderRepository, PosClient, PosOrder, StoreRepository},
    retry::RetryScheduler,
    status::StatusForwarder,
    stoplist::{StopListCorrector, StopListError},
    WebhookError,
};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("No local order for POS order {0}")]
    OrderNotFound(String),

    #[error("POS has no order {0}")]
    PosOrderNotFound(String),

    #[error(transparent)]
    Classification(#[from] ClassifyError),

    #[error("Stop-list correction failed: {0}")]
    StopList(#[from] StopListError),

    #[error(transparent)]
    Port(#[from] WebhookError),
}

/// Outcome of a POS creation error, derived per event and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// The error is the transient timeout sentinel
    pub retry: bool,
    pub new_status: OrderStatus,
    pub schedule_retry: bool,
}

/// Decide between another creation attempt and a permanent failure
pub fn decide_retry(order: &Order, error: &ErrorInfo, budget: u32, timeout_sentinel: &str) -> RetryDecision {
    let retry = error.is_timeout(timeout_sentinel);
    let schedule_retry =
        retry && order.retry_count <= budget && !order.status.is_terminal_failure();

    RetryDecision {
        retry,
        new_status: if schedule_retry {
            OrderStatus::New
        } else {
            OrderStatus::Failed
        },
        schedule_retry,
    }
}

/// Map a POS order status onto the local status set
///
/// `None` means the event carries nothing to write.
pub fn map_pos_status(creation_status: Option<&CreationStatus>, pos_status: Option<&str>) -> Option<OrderStatus> {
    match pos_status {
        Some("Unconfirmed") | Some("WaitCooking") => Some(OrderStatus::WaitCooking),
        Some("ReadyForCooking") => Some(OrderStatus::Accepted),
        Some("CookingStarted") | Some("CookingCompleted") | Some("Waiting") | Some("OnWay") => {
            Some(OrderStatus::CookingStarted)
        }
        Some("Delivered") | Some("Closed") => Some(OrderStatus::Closed),
        Some("Cancelled") => Some(OrderStatus::Cancelled),
        Some(_) => None,
        None => match creation_status {
            Some(CreationStatus::Success) => Some(OrderStatus::Accepted),
            _ => None,
        },
    }
}

/// Rewrite an event whose error the POS no longer reports
fn absorb_transient_error(info: &EventInfo, pos_order: PosOrder) -> EventInfo {
    let mut rewritten = info.clone();
    rewritten.creation_status = Some(CreationStatus::Success);
    rewritten.error_info = None;
    if pos_order.order.is_some() {
        rewritten.order = pos_order.order;
    }
    rewritten
}

pub struct Reconciler {
    orders: Arc<dyn OrderRepository>,
    stores: Arc<dyn StoreRepository>,
    pos: Arc<dyn PosClient>,
    classifier: ErrorClassifier,
    corrector: StopListCorrector,
    retry: RetryScheduler,
    notifier: Arc<NotificationGate>,
    forwarder: StatusForwarder,
    timeout_sentinel: String,
    default_retry_budget: u32,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        stores: Arc<dyn StoreRepository>,
        pos: Arc<dyn PosClient>,
        classifier: ErrorClassifier,
        corrector: StopListCorrector,
        retry: RetryScheduler,
        notifier: Arc<NotificationGate>,
        forwarder: StatusForwarder,
        policy: &ReconcileConfig,
    ) -> Self {
        Self {
            orders,
            stores,
            pos,
            classifier,
            corrector,
            retry,
            notifier,
            forwarder,
            timeout_sentinel: policy.timeout_sentinel.clone(),
            default_retry_budget: policy.default_retry_budget,
        }
    }

    #[instrument(
        skip(self, event),
        fields(
            pos_order_id = %event.event_info.id,
            correlation_id = %event.correlation_id,
            kind = %event.event_kind.as_str(),
        )
    )]
    pub async fn reconcile(&self, event: &WebhookEvent, ctx: OrderContext) -> Result<(), ReconcileError> {
        let info = &event.event_info;

        let order = self
            .orders
            .find_by_pos_order_id(&info.id)
            .await?
            .ok_or_else(|| ReconcileError::OrderNotFound(info.id.clone()))?;

        if !info.is_creation_error() {
            return self.pass_through(order, info, ctx).await;
        }

        let pos_order = match self.pos.fetch_order(event.pos_organization_id(), &info.id).await {
            Ok(pos_order) => pos_order,
            Err(WebhookError::PosOrderNotFound(id)) => return Err(ReconcileError::PosOrderNotFound(id)),
            Err(e) => return Err(e.into()),
        };

        if !pos_order.is_creation_error() {
            warn!(
                pos_creation_status = ?pos_order.creation_status,
                "POS no longer reports a creation error, treating webhook error as transient"
            );
            let rewritten = absorb_transient_error(info, pos_order);
            return self.pass_through(order, &rewritten, ctx).await;
        }

        self.handle_creation_error(order, info, pos_order, ctx).await
    }

    async fn handle_creation_error(
        &self,
        mut order: Order,
        info: &EventInfo,
        pos_order: PosOrder,
        ctx: OrderContext,
    ) -> Result<(), ReconcileError> {
        let error = pos_order
            .error_info
            .or_else(|| info.error_info.clone())
            .unwrap_or_default();

        order.record_error(&error.code, &error.message);

        let store = self.stores.find_by_id(&order.restaurant_id).await?;
        let budget = self.retry_budget(store.as_ref()).await?;
        let decision = decide_retry(&order, &error, budget, &self.timeout_sentinel);

        let classification = self.classifier.classify(&error)?;
        order.fail_reason = classification.fail_reason(&error.message_text());
        order.status = decision.new_status;
        if decision.schedule_retry {
            order.retry_count += 1;
        }

        if decision.new_status == OrderStatus::Failed {
            if let Some(item_id) = classification.stop_list_target() {
                let store = store
                    .as_ref()
                    .ok_or_else(|| WebhookError::StoreNotFound(order.restaurant_id.clone()))?;
                self.corrector
                    .correct(store, item_id, &classification.solution, &order)
                    .await?;
            }
        }

        self.orders.save(&order).await?;

        info!(
            status = %order.status,
            retry_count = order.retry_count,
            budget = budget,
            fail_code = %order.fail_reason.code,
            "Order creation error reconciled"
        );

        if decision.schedule_retry {
            self.retry.schedule_retry(&order.pos_order_id).await?;
        } else {
            self.notifier.spawn(order.clone(), error);
        }

        self.forwarder.forward(&order, info, ctx).await?;
        Ok(())
    }

    async fn pass_through(&self, mut order: Order, info: &EventInfo, ctx: OrderContext) -> Result<(), ReconcileError> {
        match map_pos_status(info.creation_status.as_ref(), info.order_status()) {
            Some(status) if status != order.status => {
                debug!(from = %order.status, to = %status, "Updating order status");
                order.status = status;
                self.orders.save(&order).await?;
            }
            Some(_) => debug!(status = %order.status, "Order status unchanged"),
            None => debug!(pos_status = ?info.order_status(), "No status to propagate"),
        }

        self.forwarder.forward(&order, info, ctx).await?;
        Ok(())
    }

    async fn retry_budget(&self, store: Option<&Store>) -> Result<u32, WebhookError> {
        let Some(store) = store else {
            return Ok(self.default_retry_budget);
        };

        Ok(self
            .stores
            .retry_budget(&store.store_group_id)
            .await?
            .unwrap_or(self.default_retry_budget))
    }
}
