use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::{CoreError, Result};

/// Environment variable prefix, e.g. `ORDERHEAL__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "ORDERHEAL";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub nats: NatsSettings,
    pub pos: PosConfig,
    pub status_api: StatusApiConfig,
    pub stop_list: StopListConfig,
    pub incidents: IncidentsConfig,
    pub telegram: TelegramConfig,
    pub queues: QueueConfig,
    pub reconcile: ReconcileConfig,
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Load configuration from environment variables only
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an optional file with environment overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("reconcile.direct_status_services")
                .with_list_parse_key("stop_list.product_codes")
                .with_list_parse_key("stop_list.attribute_codes"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the reconciler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.reconcile.timeout_sentinel.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "reconcile.timeout_sentinel must not be empty".to_string(),
            ));
        }

        if self.queues.retry.is_empty() || self.queues.offline_orders.is_empty() {
            return Err(CoreError::InvalidConfig("queue names must not be empty".to_string()));
        }

        let products: HashSet<&String> = self.stop_list.product_codes.iter().collect();
        if let Some(code) = self
            .stop_list
            .attribute_codes
            .iter()
            .find(|c| products.contains(c))
        {
            return Err(CoreError::InvalidConfig(format!(
                "error code {} is listed as both a product and an attribute code",
                code
            )));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/orderheal".to_string(),
            max_connections: 10,
            min_connections: 2,
        }
    }
}

/// NATS connection used for the retry and offline-order queues
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsSettings {
    pub url: String,
    pub name: Option<String>,
    pub subject_prefix: Option<String>,
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            name: Some("orderheal".to_string()),
            subject_prefix: Some("orderheal.".to_string()),
        }
    }
}

/// POS API access; the token is issued out of band
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PosConfig {
    pub base_url: String,
    pub api_token: String,
    pub timeout_seconds: u64,
}

impl PosConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-ru.iiko.services".to_string(),
            api_token: String::new(),
            timeout_seconds: 30,
        }
    }
}

/// Downstream order-status API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl StatusApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for StatusApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Stop-list service and the error codes that drive corrections
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StopListConfig {
    pub base_url: String,
    pub product_codes: Vec<String>,
    pub attribute_codes: Vec<String>,
}

impl Default for StopListConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8082".to_string(),
            product_codes: vec!["4".to_string(), "6".to_string()],
            attribute_codes: vec!["5".to_string(), "7".to_string()],
        }
    }
}

/// One incident destination (issue tracker, task board)
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentChannelConfig {
    pub name: String,
    pub url: String,
    pub service_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IncidentsConfig {
    pub channels: Vec<IncidentChannelConfig>,
    pub task_list: String,
}

impl Default for IncidentsConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            task_list: "ORDER_ERROR".to_string(),
        }
    }
}

/// Chat that receives stop-list notices; disabled while `bot_token` is empty
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn is_enabled(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

/// Queue names (NATS subjects without prefix)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub retry: String,
    pub offline_orders: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry: "order-retry".to_string(),
            offline_orders: "offline-orders".to_string(),
        }
    }
}

/// Reconciliation policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// POS error text that marks a transient creation failure
    pub timeout_sentinel: String,
    /// Used when the store group has no budget of its own
    pub default_retry_budget: u32,
    /// Delivery services whose status is written straight to the repository
    pub direct_status_services: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            timeout_sentinel: "Creation timeout".to_string(),
            default_retry_budget: 3,
            direct_status_services: vec!["glovo".to_string(), "wolt".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "config/error_catalog.toml".to_string(),
        }
    }
}
