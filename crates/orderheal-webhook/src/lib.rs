//! Webhook-driven order reconciliation for POS orders
//!
//! This crate consumes the asynchronous events a POS system emits about the
//! orders it was asked to create and heals the local order record:
//! - Dispatches webhook batches by event kind
//! - Reconciles the local order against the authoritative POS state
//! - Classifies permanent POS errors against an ordered error catalog
//! - Removes offending products/attributes from sale
//! - Schedules retries for transient failures within a per-store budget
//! - Escalates unexpected failures to incident channels
//!
//! # Example
//!
//! ```rust,ignore
//! use orderheal_webhook::{Dispatcher, ErrorCatalog, Ports, RawEvent};
//!
//! let catalog = Arc::new(ErrorCatalog::load("config/error_catalog.toml")?);
//! let dispatcher = Dispatcher::from_config(ports, catalog, &config)?;
//!
//! let events = RawEvent::parse_batch(&body)?;
//! let summary = dispatcher.dispatch(events).await?;
//! ```

// Module order matters due to dependencies
pub mod events;
pub mod catalog;
pub mod classifier;
pub mod ports;
pub mod stoplist;
pub mod retry;
pub mod notify;
pub mod status;
pub mod reconciler;
pub mod dispatcher;
pub mod inbound;
pub mod memory;

pub use catalog::*;
pub use classifier::*;
pub use dispatcher::*;
pub use events::*;
pub use inbound::*;
pub use notify::*;
pub use ports::*;
pub use reconciler::*;
pub use retry::*;
pub use status::*;
pub use stoplist::*;

use thiserror::Error;

/// Errors surfaced by the collaborators behind the port traits
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("POS order not found: {0}")]
    PosOrderNotFound(String),

    #[error("POS unavailable: {0}")]
    PosUnavailable(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Stop-list service error: {0}")]
    StopList(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WebhookError>;
