//! Fakes and recording doubles for the outbound ports

use async_trait::async_trait;
use dashmap::DashMap;
use orderheal_core::Store;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    events::{EventInfo, OrderContext},
    notify::Incident,
    ports::{IncidentChannel, OrderStatusSink, PosClient, PosOrder, StopListClient, StopListNotifier},
    stoplist::StopListNotice,
    Result, WebhookError,
};

/// POS orders keyed by POS order id
#[derive(Default)]
pub struct InMemoryPosClient {
    orders: DashMap<String, PosOrder>,
    fetches: Mutex<usize>,
}

impl InMemoryPosClient {
    pub fn insert(&self, order: PosOrder) {
        self.orders.insert(order.id.clone(), order);
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock()
    }
}

#[async_trait]
impl PosClient for InMemoryPosClient {
    async fn fetch_order(&self, _organization_id: &str, pos_order_id: &str) -> Result<PosOrder> {
        *self.fetches.lock() += 1;
        self.orders
            .get(pos_order_id)
            .map(|o| o.clone())
            .ok_or_else(|| WebhookError::PosOrderNotFound(pos_order_id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopListCall {
    Products { store_id: String, ids: Vec<String> },
    Attributes { store_id: String, ids: Vec<String> },
    Refresh { store_id: String },
}

/// Records stop-list calls; refreshes can be made to fail per store
#[derive(Default)]
pub struct RecordingStopListClient {
    calls: Mutex<Vec<StopListCall>>,
    failing_refresh: Mutex<HashSet<String>>,
    failing_stops: AtomicBool,
}

impl RecordingStopListClient {
    pub fn fail_refresh_for(&self, store_id: &str) {
        self.failing_refresh.lock().insert(store_id.to_string());
    }

    /// Product and attribute stops fail from now on
    pub fn fail_stops(&self) {
        self.failing_stops.store(true, Ordering::SeqCst);
    }

    fn check_stops(&self) -> Result<()> {
        if self.failing_stops.load(Ordering::SeqCst) {
            return Err(WebhookError::StopList("stop-list service unavailable".to_string()));
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<StopListCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StopListClient for RecordingStopListClient {
    async fn stop_products(&self, store: &Store, product_ids: &[String]) -> Result<()> {
        self.check_stops()?;
        self.calls.lock().push(StopListCall::Products {
            store_id: store.id.clone(),
            ids: product_ids.to_vec(),
        });
        Ok(())
    }

    async fn stop_attributes(&self, store: &Store, attribute_ids: &[String]) -> Result<()> {
        self.check_stops()?;
        self.calls.lock().push(StopListCall::Attributes {
            store_id: store.id.clone(),
            ids: attribute_ids.to_vec(),
        });
        Ok(())
    }

    async fn refresh(&self, store: &Store) -> Result<()> {
        if self.failing_refresh.lock().contains(&store.id) {
            return Err(WebhookError::StopList(format!("refresh failed for {}", store.id)));
        }
        self.calls.lock().push(StopListCall::Refresh {
            store_id: store.id.clone(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStopListNotifier {
    notices: Mutex<Vec<StopListNotice>>,
    fail: bool,
}

impl RecordingStopListNotifier {
    pub fn failing() -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn notices(&self) -> Vec<StopListNotice> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl StopListNotifier for RecordingStopListNotifier {
    async fn notify(&self, notice: &StopListNotice) -> Result<()> {
        if self.fail {
            return Err(WebhookError::Notification("notifier unavailable".to_string()));
        }
        self.notices.lock().push(notice.clone());
        Ok(())
    }
}

pub struct RecordingIncidentChannel {
    name: String,
    service_id: String,
    incidents: Mutex<Vec<Incident>>,
    fail: bool,
}

impl RecordingIncidentChannel {
    pub fn new(name: &str, service_id: &str) -> Self {
        Self {
            name: name.to_string(),
            service_id: service_id.to_string(),
            incidents: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(name: &str, service_id: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, service_id)
        }
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.lock().clone()
    }
}

#[async_trait]
impl IncidentChannel for RecordingIncidentChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn service_id(&self) -> &str {
        &self.service_id
    }

    async fn create(&self, incident: &Incident) -> Result<()> {
        if self.fail {
            return Err(WebhookError::Notification(format!("{} unavailable", self.name)));
        }
        self.incidents.lock().push(incident.clone());
        Ok(())
    }
}

/// Records (POS order id, context) pairs
#[derive(Default)]
pub struct RecordingStatusSink {
    forwarded: Mutex<Vec<(String, OrderContext)>>,
}

impl RecordingStatusSink {
    pub fn forwarded(&self) -> Vec<(String, OrderContext)> {
        self.forwarded.lock().clone()
    }
}

#[async_trait]
impl OrderStatusSink for RecordingStatusSink {
    async fn forward(&self, info: &EventInfo, ctx: OrderContext) -> Result<()> {
        self.forwarded.lock().push((info.id.clone(), ctx));
        Ok(())
    }
}
