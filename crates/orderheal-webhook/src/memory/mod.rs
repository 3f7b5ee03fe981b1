//! In-memory implementations of the collaborator ports
//!
//! Back the server's `--in-memory` mode and the tests. Recording doubles for
//! the outbound ports are only built for tests and the `testing` feature.

use async_trait::async_trait;
use dashmap::DashMap;
use orderheal_core::{Order, OrderStatus, Store};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;

use crate::{
    ports::{MessageQueue, OrderRepository, StoreRepository},
    Result, WebhookError,
};

#[cfg(any(test, feature = "testing"))]
mod doubles;

#[cfg(any(test, feature = "testing"))]
pub use doubles::*;

/// Orders keyed by POS order id
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: DashMap<String, Order>,
    status_updates: Mutex<Vec<(String, OrderStatus)>>,
    saves: Mutex<usize>,
}

impl InMemoryOrderRepository {
    pub fn insert(&self, order: Order) {
        self.orders.insert(order.pos_order_id.clone(), order);
    }

    pub fn get(&self, pos_order_id: &str) -> Option<Order> {
        self.orders.get(pos_order_id).map(|o| o.clone())
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    pub fn status_updates(&self) -> Vec<(String, OrderStatus)> {
        self.status_updates.lock().clone()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_pos_order_id(&self, pos_order_id: &str) -> Result<Option<Order>> {
        Ok(self.get(pos_order_id))
    }

    async fn save(&self, order: &Order) -> Result<()> {
        self.orders.insert(order.pos_order_id.clone(), order.clone());
        *self.saves.lock() += 1;
        Ok(())
    }

    async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<()> {
        let mut found = false;
        for mut entry in self.orders.iter_mut() {
            if entry.id == order_id {
                entry.status = status;
                found = true;
            }
        }
        if !found {
            return Err(WebhookError::Repository(format!("order {} not found", order_id)));
        }
        self.status_updates.lock().push((order_id.to_string(), status));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStoreRepository {
    stores: DashMap<String, Store>,
    budgets: DashMap<String, u32>,
}

impl InMemoryStoreRepository {
    pub fn insert(&self, store: Store) {
        self.stores.insert(store.id.clone(), store);
    }

    pub fn set_retry_budget(&self, store_group_id: &str, budget: u32) {
        self.budgets.insert(store_group_id.to_string(), budget);
    }
}

#[async_trait]
impl StoreRepository for InMemoryStoreRepository {
    async fn find_by_id(&self, store_id: &str) -> Result<Option<Store>> {
        Ok(self.stores.get(store_id).map(|s| s.clone()))
    }

    /// Ordered by store id
    async fn find_by_pos_organization(&self, organization_id: &str) -> Result<Vec<Store>> {
        let mut stores: Vec<Store> = self
            .stores
            .iter()
            .filter(|s| s.pos_organization_id == organization_id)
            .map(|s| s.clone())
            .collect();
        stores.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stores)
    }

    async fn retry_budget(&self, store_group_id: &str) -> Result<Option<u32>> {
        Ok(self.budgets.get(store_group_id).map(|b| *b))
    }
}

/// Messages published per queue, in order
#[derive(Default)]
pub struct InMemoryQueue {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl InMemoryQueue {
    pub fn messages(&self, queue: &str) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, payload)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.messages.lock().len()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        self.messages.lock().push((queue.to_string(), payload));
        Ok(())
    }
}

/// Stores, orders and group budgets loaded into the in-memory repositories
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemorySeed {
    pub stores: Vec<Store>,
    pub orders: Vec<Order>,
    pub retry_budgets: HashMap<String, u32>,
}

impl MemorySeed {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| WebhookError::InvalidPayload(format!("seed: {}", e)))
    }

    pub fn apply(self, orders: &InMemoryOrderRepository, stores: &InMemoryStoreRepository) {
        for store in self.stores {
            stores.insert(store);
        }
        for order in self.orders {
            orders.insert(order);
        }
        for (group, budget) in self.retry_budgets {
            stores.set_retry_budget(&group, budget);
        }
    }
}
