use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use orderheal_core::NatsSettings;
use orderheal_webhook::MessageQueue;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::{InfraError, Result};

#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub url: String,
    pub name: Option<String>,
    pub subject_prefix: Option<String>,
    pub max_reconnect_delay: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        NatsSettings::default().into()
    }
}

impl From<NatsSettings> for NatsConfig {
    fn from(settings: NatsSettings) -> Self {
        Self {
            url: settings.url,
            name: settings.name,
            subject_prefix: settings.subject_prefix,
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl NatsConfig {
    /// Subject a queue name is published on
    pub fn subject_for(&self, queue: &str) -> String {
        match &self.subject_prefix {
            Some(prefix) => format!("{}{}", prefix, queue),
            None => queue.to_string(),
        }
    }
}

/// Retry and offline-order queues on top of NATS subjects
#[derive(Clone)]
pub struct NatsQueue {
    client: Client,
    config: NatsConfig,
}

impl NatsQueue {
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!(url = %config.url, "Connecting to NATS");

        let max_delay = config.max_reconnect_delay;
        let mut options = ConnectOptions::new().reconnect_delay_callback(move |attempts| {
            let delay = std::cmp::min(Duration::from_secs(2_u64.saturating_pow(attempts as u32)), max_delay);
            debug!(attempts, delay = ?delay, "NATS reconnect");
            delay
        });

        if let Some(name) = &config.name {
            options = options.name(name);
        }

        let client = options.connect(&config.url).await.map_err(|e| {
            error!(error = %e, "Failed to connect to NATS");
            InfraError::Messaging(format!("Failed to connect to NATS: {}", e))
        })?;

        info!("NATS connection established");
        Ok(Self { client, config })
    }

    pub async fn publish_raw(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        let subject = self.config.subject_for(queue);
        debug!(subject = %subject, bytes = payload.len(), "Publishing message");

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| {
                error!(subject = %subject, error = %e, "Failed to publish");
                InfraError::Messaging(format!("Failed to publish to {}: {}", subject, e))
            })?;

        Ok(())
    }
}

#[async_trait]
impl MessageQueue for NatsQueue {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> orderheal_webhook::Result<()> {
        Ok(self.publish_raw(queue, payload).await?)
    }
}
