//! Collaborator contracts
//!
//! The reconciliation core talks to the order store, the POS, the stop-list
//! service, queues and notification channels only through these traits.

use async_trait::async_trait;
use orderheal_core::{Order, OrderStatus, Store};
use std::sync::Arc;

use crate::{
    events::{CreationStatus, ErrorInfo, EventInfo, OrderContext, PosOrderBody},
    notify::Incident,
    stoplist::StopListNotice,
    Result,
};

/// Order persistence; read-modify-write, last write wins
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_pos_order_id(&self, pos_order_id: &str) -> Result<Option<Order>>;

    /// Replace the whole order record
    async fn save(&self, order: &Order) -> Result<()>;

    async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<()>;
}

#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn find_by_id(&self, store_id: &str) -> Result<Option<Store>>;

    async fn find_by_pos_organization(&self, organization_id: &str) -> Result<Vec<Store>>;

    /// Retry budget configured for a store group, if any
    async fn retry_budget(&self, store_group_id: &str) -> Result<Option<u32>>;
}

/// Authoritative order state as reported by the POS
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosOrder {
    pub id: String,
    pub creation_status: Option<CreationStatus>,
    pub error_info: Option<ErrorInfo>,
    pub order: Option<PosOrderBody>,
}

impl PosOrder {
    pub fn is_creation_error(&self) -> bool {
        matches!(self.creation_status, Some(CreationStatus::Error))
    }
}

/// Already-authenticated POS API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PosClient: Send + Sync {
    /// Fails with `WebhookError::PosOrderNotFound` when the POS has no such order
    async fn fetch_order(&self, organization_id: &str, pos_order_id: &str) -> Result<PosOrder>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StopListClient: Send + Sync {
    async fn stop_products(&self, store: &Store, product_ids: &[String]) -> Result<()>;

    async fn stop_attributes(&self, store: &Store, attribute_ids: &[String]) -> Result<()>;

    /// Re-read the store's stop-list from the POS
    async fn refresh(&self, store: &Store) -> Result<()>;
}

#[async_trait]
pub trait StopListNotifier: Send + Sync {
    async fn notify(&self, notice: &StopListNotice) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()>;
}

/// Issue tracker or task board
#[async_trait]
pub trait IncidentChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Identifier listed in the incident `services` field
    fn service_id(&self) -> &str;

    async fn create(&self, incident: &Incident) -> Result<()>;
}

/// Downstream order-status API
#[async_trait]
pub trait OrderStatusSink: Send + Sync {
    async fn forward(&self, info: &EventInfo, ctx: OrderContext) -> Result<()>;
}

/// Every collaborator the reconciliation core needs
#[derive(Clone)]
pub struct Ports {
    pub orders: Arc<dyn OrderRepository>,
    pub stores: Arc<dyn StoreRepository>,
    pub pos: Arc<dyn PosClient>,
    pub stop_list: Arc<dyn StopListClient>,
    pub stop_list_notifier: Arc<dyn StopListNotifier>,
    pub queue: Arc<dyn MessageQueue>,
    pub status_sink: Arc<dyn OrderStatusSink>,
    pub incident_channels: Vec<Arc<dyn IncidentChannel>>,
}
