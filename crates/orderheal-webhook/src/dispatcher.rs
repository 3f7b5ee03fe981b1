//! Webhook batch dispatch
//!
//! Events are handled one at a time, in arrival order. A failing event is
//! recorded and the batch carries on.

use orderheal_core::AppConfig;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    catalog::ErrorCatalog,
    classifier::ErrorClassifier,
    events::{EventKind, OrderContext, RawEvent, WebhookEvent},
    notify::NotificationGate,
    ports::{MessageQueue, Ports, StopListClient, StoreRepository},
    reconciler::{ReconcileError, Reconciler},
    retry::RetryScheduler,
    status::StatusForwarder,
    stoplist::{StopListCodes, StopListCorrector, StopListError},
    WebhookError,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Webhook batch is empty")]
    EmptyBatch,

    #[error("No event in the batch produced a result")]
    EmptyResult,
}

/// Why a single event of a batch failed
#[derive(Error, Debug)]
pub enum EventError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Port(#[from] WebhookError),

    #[error("Failed to encode event info: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-event outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub success: Vec<String>,
    pub errors: Vec<String>,
}

impl DispatchSummary {
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.errors.is_empty()
    }
}

pub struct Dispatcher {
    reconciler: Reconciler,
    stores: Arc<dyn StoreRepository>,
    stop_list: Arc<dyn StopListClient>,
    queue: Arc<dyn MessageQueue>,
    offline_queue: String,
}

impl Dispatcher {
    pub fn new(
        reconciler: Reconciler,
        stores: Arc<dyn StoreRepository>,
        stop_list: Arc<dyn StopListClient>,
        queue: Arc<dyn MessageQueue>,
        offline_queue: &str,
    ) -> Self {
        Self {
            reconciler,
            stores,
            stop_list,
            queue,
            offline_queue: offline_queue.to_string(),
        }
    }

    /// Wire the whole reconciliation pipeline from its collaborators
    pub fn from_config(ports: Ports, catalog: Arc<ErrorCatalog>, config: &AppConfig) -> Result<Self, StopListError> {
        let codes = StopListCodes::new(
            config.stop_list.product_codes.iter().cloned(),
            config.stop_list.attribute_codes.iter().cloned(),
        )?;

        let notifier = Arc::new(NotificationGate::new(
            ports.stores.clone(),
            ports.incident_channels.clone(),
            &config.reconcile.timeout_sentinel,
            &config.incidents.task_list,
        ));

        let reconciler = Reconciler::new(
            ports.orders.clone(),
            ports.stores.clone(),
            ports.pos.clone(),
            ErrorClassifier::new(catalog),
            StopListCorrector::new(ports.stop_list.clone(), ports.stop_list_notifier.clone(), codes),
            RetryScheduler::new(ports.queue.clone(), &config.queues.retry),
            notifier,
            StatusForwarder::new(
                ports.orders.clone(),
                ports.status_sink.clone(),
                config.reconcile.direct_status_services.iter().cloned(),
            ),
            &config.reconcile,
        );

        Ok(Self::new(
            reconciler,
            ports.stores,
            ports.stop_list,
            ports.queue,
            &config.queues.offline_orders,
        ))
    }

    pub async fn dispatch(&self, events: Vec<RawEvent>) -> Result<DispatchSummary, DispatchError> {
        if events.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }

        let mut summary = DispatchSummary::default();

        for raw in events {
            let event = match raw {
                RawEvent::Known(event) => event,
                RawEvent::Unrecognized { event_type, reason } => {
                    warn!(kind = %event_type, reason = %reason, "Unrecognized webhook event");
                    summary.errors.push(format!("{}: {}", event_type, reason));
                    continue;
                }
            };

            match self.handle(&event).await {
                Ok(()) => {
                    info!(
                        kind = %event.event_kind.as_str(),
                        pos_order_id = %event.event_info.id,
                        correlation_id = %event.correlation_id,
                        "Webhook event handled"
                    );
                    summary.success.push(describe(&event));
                }
                Err(e) => {
                    error!(
                        kind = %event.event_kind.as_str(),
                        pos_order_id = %event.event_info.id,
                        correlation_id = %event.correlation_id,
                        error = %e,
                        "Webhook event failed"
                    );
                    summary.errors.push(format!("{}: {}", describe(&event), e));
                }
            }
        }

        if summary.is_empty() {
            return Err(DispatchError::EmptyResult);
        }

        Ok(summary)
    }

    async fn handle(&self, event: &WebhookEvent) -> Result<(), EventError> {
        match event.event_kind {
            EventKind::StopListUpdate => self.refresh_stop_lists(event).await?,
            EventKind::DeliveryOrderUpdate | EventKind::DeliveryOrderError => {
                self.reconciler.reconcile(event, OrderContext::Delivery).await?
            }
            EventKind::TableOrderUpdate => {
                let payload = serde_json::to_vec(&event.event_info)?;
                self.queue.publish(&self.offline_queue, payload).await?;
                self.reconciler.reconcile(event, OrderContext::Table).await?
            }
        }
        Ok(())
    }

    /// Refresh the originating store, then siblings on other POS credentials
    async fn refresh_stop_lists(&self, event: &WebhookEvent) -> Result<(), WebhookError> {
        let organization_id = event.pos_organization_id();
        let stores = self.stores.find_by_pos_organization(organization_id).await?;

        let Some((origin, others)) = stores.split_first() else {
            return Err(WebhookError::StoreNotFound(organization_id.to_string()));
        };

        self.stop_list.refresh(origin).await?;

        for sibling in others.iter().filter(|s| s.pos_token != origin.pos_token) {
            if let Err(e) = self.stop_list.refresh(sibling).await {
                warn!(
                    store_id = %sibling.id,
                    origin_store_id = %origin.id,
                    error = %e,
                    "Sibling stop-list refresh failed"
                );
            }
        }

        Ok(())
    }
}

fn describe(event: &WebhookEvent) -> String {
    match event.event_kind {
        EventKind::StopListUpdate => format!("{} {}", event.event_kind.as_str(), event.pos_organization_id()),
        _ => format!("{} {}", event.event_kind.as_str(), event.event_info.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ErrorSolution;
    use crate::events::{CreationStatus, EventInfo, PosOrderBody};
    use crate::memory::*;
    use crate::ports::IncidentChannel;
    use orderheal_core::{Order, OrderStatus, Store};

    fn store(id: &str, token: &str) -> Store {
        Store {
            id: id.to_string(),
            name: format!("Store {}", id),
            address: "Main st. 1".to_string(),
            store_group_id: "group-1".to_string(),
            pos_organization_id: "org-1".to_string(),
            pos_token: token.to_string(),
            delivery_services: Vec::new(),
        }
    }

    struct Fixture {
        orders: Arc<InMemoryOrderRepository>,
        stores: Arc<InMemoryStoreRepository>,
        stop_list: Arc<RecordingStopListClient>,
        queue: Arc<InMemoryQueue>,
        sink: Arc<RecordingStatusSink>,
        dispatcher: Dispatcher,
    }

    fn fixture() -> Fixture {
        let orders = Arc::new(InMemoryOrderRepository::default());
        let stores = Arc::new(InMemoryStoreRepository::default());
        let stop_list = Arc::new(RecordingStopListClient::default());
        let queue = Arc::new(InMemoryQueue::default());
        let sink = Arc::new(RecordingStatusSink::default());

        let ports = Ports {
            orders: orders.clone(),
            stores: stores.clone(),
            pos: Arc::new(InMemoryPosClient::default()),
            stop_list: stop_list.clone(),
            stop_list_notifier: Arc::new(RecordingStopListNotifier::default()),
            queue: queue.clone(),
            status_sink: sink.clone(),
            incident_channels: vec![Arc::new(RecordingIncidentChannel::new("tracker", "svc-1")) as Arc<dyn IncidentChannel>],
        };

        let catalog = ErrorCatalog::new(vec![ErrorSolution {
            code: "1".to_string(),
            business_name: "POS timeout".to_string(),
            reason: "No answer".to_string(),
            solution: "Retry".to_string(),
            contains: vec!["timeout".to_string()],
            extraction_pattern: None,
            send_to_telegram: false,
            send_stop_list_status: false,
        }])
        .unwrap();

        let dispatcher = Dispatcher::from_config(ports, Arc::new(catalog), &AppConfig::default()).unwrap();

        Fixture {
            orders,
            stores,
            stop_list,
            queue,
            sink,
            dispatcher,
        }
    }

    fn order_event(kind: EventKind, pos_order_id: &str, status: &str) -> RawEvent {
        WebhookEvent::new(
            kind,
            EventInfo {
                id: pos_order_id.to_string(),
                organization_id: "org-1".to_string(),
                creation_status: Some(CreationStatus::Success),
                order: Some(PosOrderBody {
                    status: Some(status.to_string()),
                    extra: Default::default(),
                }),
                ..Default::default()
            },
        )
        .into()
    }

    fn stop_list_event() -> RawEvent {
        let mut event = WebhookEvent::new(EventKind::StopListUpdate, EventInfo::default());
        event.organization_id = "org-1".to_string();
        event.into()
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let f = fixture();
        assert_eq!(f.dispatcher.dispatch(Vec::new()).await, Err(DispatchError::EmptyBatch));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let f = fixture();
        f.orders.insert(Order::new("o-2", "pos-2", "store-1", "chocofood"));

        let summary = f
            .dispatcher
            .dispatch(vec![
                order_event(EventKind::DeliveryOrderUpdate, "pos-missing", "CookingStarted"),
                RawEvent::Unrecognized {
                    event_type: "ReserveUpdate".to_string(),
                    reason: "unknown variant".to_string(),
                },
                order_event(EventKind::DeliveryOrderUpdate, "pos-2", "CookingStarted"),
            ])
            .await
            .unwrap();

        assert_eq!(summary.success, vec!["DeliveryOrderUpdate pos-2".to_string()]);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors[0].contains("pos-missing"));
        assert!(summary.errors[1].contains("ReserveUpdate"));
        assert_eq!(f.orders.get("pos-2").unwrap().status, OrderStatus::CookingStarted);
    }

    #[tokio::test]
    async fn test_stop_list_refreshes_origin_and_sibling_tokens() {
        let f = fixture();
        f.stores.insert(store("store-1", "token-a"));
        f.stores.insert(store("store-2", "token-a"));
        f.stores.insert(store("store-3", "token-b"));

        let summary = f.dispatcher.dispatch(vec![stop_list_event()]).await.unwrap();

        assert_eq!(summary.success.len(), 1);
        assert_eq!(
            f.stop_list.calls(),
            vec![
                StopListCall::Refresh {
                    store_id: "store-1".to_string()
                },
                StopListCall::Refresh {
                    store_id: "store-3".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_sibling_refresh_failure_is_swallowed() {
        let f = fixture();
        f.stores.insert(store("store-1", "token-a"));
        f.stores.insert(store("store-2", "token-b"));
        f.stop_list.fail_refresh_for("store-2");

        let summary = f.dispatcher.dispatch(vec![stop_list_event()]).await.unwrap();

        assert_eq!(summary.success.len(), 1);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_stop_list_without_store_fails() {
        let f = fixture();

        let summary = f.dispatcher.dispatch(vec![stop_list_event()]).await.unwrap();

        assert!(summary.success.is_empty());
        assert_eq!(summary.errors.len(), 1);
        assert!(f.stop_list.calls().is_empty());
    }

    #[tokio::test]
    async fn test_table_update_goes_to_offline_queue_first() {
        let f = fixture();
        f.orders.insert(Order::new("o-1", "pos-1", "store-1", "chocofood"));

        f.dispatcher
            .dispatch(vec![order_event(EventKind::TableOrderUpdate, "pos-1", "Closed")])
            .await
            .unwrap();

        let published = f.queue.messages("offline-orders");
        assert_eq!(published.len(), 1);
        let info: serde_json::Value = serde_json::from_str(&published[0]).unwrap();
        assert_eq!(info["id"], "pos-1");

        assert_eq!(f.orders.get("pos-1").unwrap().status, OrderStatus::Closed);
        assert_eq!(f.sink.forwarded(), vec![("pos-1".to_string(), OrderContext::Table)]);
    }

    #[tokio::test]
    async fn test_missing_order_is_a_reconcile_error() {
        let f = fixture();
        let RawEvent::Known(event) = order_event(EventKind::DeliveryOrderUpdate, "pos-missing", "Closed") else {
            panic!("expected a known event");
        };

        let err = f.dispatcher.handle(&event).await.unwrap_err();

        assert!(matches!(err, EventError::Reconcile(ReconcileError::OrderNotFound(id)) if id == "pos-missing"));
    }

    #[tokio::test]
    async fn test_stop_list_without_store_is_a_port_error() {
        let f = fixture();
        let RawEvent::Known(event) = stop_list_event() else {
            panic!("expected a known event");
        };

        let err = f.dispatcher.handle(&event).await.unwrap_err();

        assert!(matches!(err, EventError::Port(WebhookError::StoreNotFound(org)) if org == "org-1"));
    }

    #[test]
    fn test_summary_serializes_both_lists() {
        let summary = DispatchSummary {
            success: vec!["a".to_string()],
            errors: Vec::new(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json, serde_json::json!({"success": ["a"], "errors": []}));
    }
}
