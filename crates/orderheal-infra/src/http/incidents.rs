use async_trait::async_trait;
use orderheal_core::IncidentChannelConfig;
use orderheal_webhook::{Incident, IncidentChannel, WebhookError};
use reqwest::Client;
use std::time::Duration;

use super::{build_client, ensure_success};

/// Issue tracker or task board that accepts incidents as JSON
pub struct HttpIncidentChannel {
    client: Client,
    name: String,
    url: String,
    service_id: String,
}

impl HttpIncidentChannel {
    pub fn new(config: &IncidentChannelConfig, timeout: Duration) -> orderheal_webhook::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            name: config.name.clone(),
            url: config.url.clone(),
            service_id: config.service_id.clone(),
        })
    }
}

#[async_trait]
impl IncidentChannel for HttpIncidentChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn service_id(&self) -> &str {
        &self.service_id
    }

    async fn create(&self, incident: &Incident) -> orderheal_webhook::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(incident)
            .send()
            .await
            .map_err(|e| WebhookError::Notification(format!("{}: {}", self.name, e)))?;

        ensure_success(response, &self.url)?;
        Ok(())
    }
}
