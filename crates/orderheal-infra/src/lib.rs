pub mod database;
pub mod messaging;
pub mod http;

pub use database::{
    pool::{create_pool, run_migrations},
    orders::PgOrderRepository,
    stores::PgStoreRepository,
};

pub use messaging::nats::{NatsConfig, NatsQueue};

pub use http::{
    incidents::HttpIncidentChannel,
    pos::IikoPosClient,
    status::HttpOrderStatusClient,
    stoplist::{HttpStopListClient, LogStopListNotifier, TelegramNotifier},
};

use orderheal_webhook::WebhookError;

#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

pub type Result<T> = std::result::Result<T, InfraError>;

impl From<InfraError> for WebhookError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Messaging(msg) => WebhookError::Queue(msg),
            InfraError::Http(e) => WebhookError::Http(e.to_string()),
            InfraError::Serialization(e) => WebhookError::Serialization(e.to_string()),
            other => WebhookError::Repository(other.to_string()),
        }
    }
}
