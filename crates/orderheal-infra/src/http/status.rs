use async_trait::async_trait;
use orderheal_webhook::{EventInfo, OrderContext, OrderStatusSink, WebhookError};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{build_client, ensure_success};

pub const DELIVERY_UPDATES_PATH: &str = "/v1/orders/iiko/updates";
pub const TABLE_UPDATES_PATH: &str = "/v1/orders/iiko/table/updates";

/// Posts event info to the order-status API
pub struct HttpOrderStatusClient {
    client: Client,
    base_url: String,
}

impl HttpOrderStatusClient {
    pub fn new(base_url: &str, timeout: Duration) -> orderheal_webhook::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, ctx: OrderContext) -> String {
        let path = match ctx {
            OrderContext::Delivery => DELIVERY_UPDATES_PATH,
            OrderContext::Table => TABLE_UPDATES_PATH,
        };
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl OrderStatusSink for HttpOrderStatusClient {
    async fn forward(&self, info: &EventInfo, ctx: OrderContext) -> orderheal_webhook::Result<()> {
        let url = self.url_for(ctx);
        debug!(pos_order_id = %info.id, url = %url, "Posting order status");

        let response = self
            .client
            .post(&url)
            .json(info)
            .send()
            .await
            .map_err(|e| WebhookError::Http(e.to_string()))?;

        ensure_success(response, &url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderheal_webhook::CreationStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn info() -> EventInfo {
        EventInfo {
            id: "pos-1".to_string(),
            organization_id: "org-1".to_string(),
            creation_status: Some(CreationStatus::Success),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_for_context() {
        let client = HttpOrderStatusClient::new("http://status.local/", Duration::from_secs(5)).unwrap();

        assert_eq!(
            client.url_for(OrderContext::Delivery),
            "http://status.local/v1/orders/iiko/updates"
        );
        assert_eq!(
            client.url_for(OrderContext::Table),
            "http://status.local/v1/orders/iiko/table/updates"
        );
    }

    #[tokio::test]
    async fn test_posts_to_context_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TABLE_UPDATES_PATH))
            .and(body_partial_json(json!({"id": "pos-1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpOrderStatusClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        client.forward(&info(), OrderContext::Table).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DELIVERY_UPDATES_PATH))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = HttpOrderStatusClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let result = client.forward(&info(), OrderContext::Delivery).await;

        assert!(matches!(result, Err(WebhookError::UnexpectedStatus { status: 502, .. })));
    }
}
