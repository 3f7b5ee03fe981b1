use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::CoreError;

/// Local order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Accepted,
    CookingStarted,
    WaitCooking,
    Failed,
    Closed,
    Cancelled,
    Error,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Accepted => "ACCEPTED",
            Self::CookingStarted => "COOKING_STARTED",
            Self::WaitCooking => "WAIT_COOKING",
            Self::Failed => "FAILED",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
            Self::Error => "ERROR",
        }
    }

    /// FAILED orders are never retried automatically again.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "ACCEPTED" => Ok(Self::Accepted),
            "COOKING_STARTED" => Ok(Self::CookingStarted),
            "WAIT_COOKING" => Ok(Self::WaitCooking),
            "FAILED" => Ok(Self::Failed),
            "CLOSED" => Ok(Self::Closed),
            "CANCELLED" => Ok(Self::Cancelled),
            "ERROR" => Ok(Self::Error),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Business-facing explanation attached to a failed order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailReason {
    pub code: String,
    pub business_name: String,
    pub reason: String,
    pub solution: String,
    pub message: String,
}

impl FailReason {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// A POS error recorded against an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderError {
    pub created_at: DateTime<Utc>,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub name: String,
}

/// Order line item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Local order record as kept by the order repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub pos_order_id: String,
    pub restaurant_id: String,
    pub delivery_service: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub fail_reason: FailReason,
    #[serde(default)]
    pub errors: Vec<OrderError>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Order {
    pub fn new(id: &str, pos_order_id: &str, restaurant_id: &str, delivery_service: &str) -> Self {
        Self {
            id: id.to_string(),
            pos_order_id: pos_order_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            delivery_service: delivery_service.to_string(),
            status: OrderStatus::New,
            retry_count: 0,
            fail_reason: FailReason::default(),
            errors: Vec::new(),
            products: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_products(mut self, products: Vec<Product>) -> Self {
        self.products = products;
        self
    }

    /// Name of a product or attribute on this order, products first.
    pub fn item_name(&self, item_id: &str) -> Option<&str> {
        if let Some(product) = self.products.iter().find(|p| p.id == item_id) {
            return Some(&product.name);
        }
        self.products
            .iter()
            .flat_map(|p| p.attributes.iter())
            .find(|a| a.id == item_id)
            .map(|a| a.name.as_str())
    }

    pub fn record_error(&mut self, code: &str, message: &str) {
        self.errors.push(OrderError {
            created_at: Utc::now(),
            code: code.to_string(),
            message: message.to_string(),
        });
    }
}

/// Store (restaurant) known to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub address: String,
    pub store_group_id: String,
    pub pos_organization_id: String,
    pub pos_token: String,
    #[serde(default)]
    pub delivery_services: Vec<String>,
}
