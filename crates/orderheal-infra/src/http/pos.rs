use async_trait::async_trait;
use orderheal_core::PosConfig;
use orderheal_webhook::{CreationStatus, ErrorInfo, PosClient, PosOrder, PosOrderBody, WebhookError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{build_client, ensure_success};

pub const DELIVERIES_BY_ID_PATH: &str = "/api/1/deliveries/by_id";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveriesByIdRequest<'a> {
    organization_id: &'a str,
    order_ids: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct DeliveriesByIdResponse {
    #[serde(default)]
    orders: Vec<PosOrderPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PosOrderPayload {
    id: String,
    #[serde(default)]
    creation_status: Option<CreationStatus>,
    #[serde(default)]
    error_info: Option<ErrorInfo>,
    #[serde(default)]
    order: Option<PosOrderBody>,
}

impl From<PosOrderPayload> for PosOrder {
    fn from(payload: PosOrderPayload) -> Self {
        PosOrder {
            id: payload.id,
            creation_status: payload.creation_status,
            error_info: payload.error_info,
            order: payload.order,
        }
    }
}

/// iiko Cloud API client; the bearer token is obtained out of band
pub struct IikoPosClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl IikoPosClient {
    pub fn new(config: &PosConfig) -> orderheal_webhook::Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl PosClient for IikoPosClient {
    async fn fetch_order(&self, organization_id: &str, pos_order_id: &str) -> orderheal_webhook::Result<PosOrder> {
        let url = format!("{}{}", self.base_url, DELIVERIES_BY_ID_PATH);
        debug!(organization_id = %organization_id, pos_order_id = %pos_order_id, "Fetching order from POS");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&DeliveriesByIdRequest {
                organization_id,
                order_ids: [pos_order_id],
            })
            .send()
            .await
            .map_err(|e| WebhookError::PosUnavailable(e.to_string()))?;

        let body: DeliveriesByIdResponse = ensure_success(response, &url)?
            .json()
            .await
            .map_err(|e| WebhookError::Serialization(e.to_string()))?;

        body.orders
            .into_iter()
            .find(|o| o.id == pos_order_id)
            .map(PosOrder::from)
            .ok_or_else(|| WebhookError::PosOrderNotFound(pos_order_id.to_string()))
    }
}
