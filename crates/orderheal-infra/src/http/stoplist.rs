use async_trait::async_trait;
use orderheal_core::{Store, TelegramConfig};
use orderheal_webhook::{StopListClient, StopListNotice, StopListNotifier, StopListTarget, WebhookError};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{build_client, ensure_success};

pub const PRODUCTS_PATH: &str = "/v1/stoplist/products";
pub const ATTRIBUTES_PATH: &str = "/v1/stoplist/attributes";
pub const REFRESH_PATH: &str = "/v1/stoplist/refresh";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityUpdate<'a> {
    store_id: &'a str,
    ids: &'a [String],
    available: bool,
}

/// Stop-list service client
pub struct HttpStopListClient {
    client: Client,
    base_url: String,
}

impl HttpStopListClient {
    pub fn new(base_url: &str, timeout: Duration) -> orderheal_webhook::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> orderheal_webhook::Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| WebhookError::StopList(e.to_string()))?;

        ensure_success(response, &url)?;
        Ok(())
    }

    async fn make_unavailable(&self, path: &str, store: &Store, ids: &[String]) -> orderheal_webhook::Result<()> {
        debug!(store_id = %store.id, ids = ?ids, path = %path, "Updating stop-list");
        self.post(
            path,
            &AvailabilityUpdate {
                store_id: &store.id,
                ids,
                available: false,
            },
        )
        .await
    }
}

#[async_trait]
impl StopListClient for HttpStopListClient {
    async fn stop_products(&self, store: &Store, product_ids: &[String]) -> orderheal_webhook::Result<()> {
        self.make_unavailable(PRODUCTS_PATH, store, product_ids).await
    }

    async fn stop_attributes(&self, store: &Store, attribute_ids: &[String]) -> orderheal_webhook::Result<()> {
        self.make_unavailable(ATTRIBUTES_PATH, store, attribute_ids).await
    }

    async fn refresh(&self, store: &Store) -> orderheal_webhook::Result<()> {
        debug!(store_id = %store.id, "Refreshing stop-list");
        self.post(REFRESH_PATH, &json!({ "storeId": store.id })).await
    }
}

/// Human-readable text of a stop-list notice
pub fn notice_text(notice: &StopListNotice) -> String {
    let kind = match notice.target {
        StopListTarget::Product => "Product",
        StopListTarget::Attribute => "Modifier",
    };
    let item = match &notice.item_name {
        Some(name) => format!("{} ({})", name, notice.item_id),
        None => notice.item_id.clone(),
    };

    format!(
        "{} {} was put on the stop-list in {}\nError code: {}\nOrder: {}",
        kind, item, notice.store_name, notice.error_code, notice.pos_order_id
    )
}

/// Sends stop-list notices to a Telegram chat through the Bot API
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, timeout: Duration) -> orderheal_webhook::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl StopListNotifier for TelegramNotifier {
    async fn notify(&self, notice: &StopListNotice) -> orderheal_webhook::Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": self.chat_id, "text": notice_text(notice) }))
            .send()
            .await
            // the request URL carries the bot token
            .map_err(|e| WebhookError::Notification(e.without_url().to_string()))?;

        ensure_success(response, "telegram sendMessage")?;
        Ok(())
    }
}

/// Fallback when no chat is configured
#[derive(Debug, Default)]
pub struct LogStopListNotifier;

#[async_trait]
impl StopListNotifier for LogStopListNotifier {
    async fn notify(&self, notice: &StopListNotice) -> orderheal_webhook::Result<()> {
        info!(
            store_id = %notice.store_id,
            item_id = %notice.item_id,
            error_code = %notice.error_code,
            "{}",
            notice_text(notice)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store() -> Store {
        Store {
            id: "store-1".to_string(),
            name: "Downtown".to_string(),
            address: "Main st. 1".to_string(),
            store_group_id: "group-1".to_string(),
            pos_organization_id: "org-1".to_string(),
            pos_token: "token-1".to_string(),
            delivery_services: Vec::new(),
        }
    }

    fn notice() -> StopListNotice {
        StopListNotice {
            store_id: "store-1".to_string(),
            store_name: "Downtown".to_string(),
            target: StopListTarget::Product,
            item_id: "p-1".to_string(),
            item_name: Some("Burger".to_string()),
            error_code: "4".to_string(),
            pos_order_id: "pos-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stop_products_marks_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PRODUCTS_PATH))
            .and(body_json(json!({"storeId": "store-1", "ids": ["p-1"], "available": false})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpStopListClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        client.stop_products(&store(), &["p-1".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpStopListClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let result = client.refresh(&store()).await;

        assert!(matches!(result, Err(WebhookError::UnexpectedStatus { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_telegram_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottoken-1/sendMessage"))
            .and(body_partial_json(json!({"chat_id": "-100"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(
            &TelegramConfig {
                api_url: server.uri(),
                bot_token: "token-1".to_string(),
                chat_id: "-100".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap();

        notifier.notify(&notice()).await.unwrap();
    }

    #[tokio::test]
    async fn test_telegram_error_hides_bot_token() {
        let notifier = TelegramNotifier::new(
            &TelegramConfig {
                api_url: "http://127.0.0.1:1".to_string(),
                bot_token: "SECRET-BOT-TOKEN".to_string(),
                chat_id: "-100".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let err = notifier.notify(&notice()).await.unwrap_err();

        assert!(matches!(err, WebhookError::Notification(_)));
        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"));
    }

    #[tokio::test]
    async fn test_telegram_rejection_hides_bot_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(
            &TelegramConfig {
                api_url: server.uri(),
                bot_token: "SECRET-BOT-TOKEN".to_string(),
                chat_id: "-100".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let err = notifier.notify(&notice()).await.unwrap_err();

        assert!(matches!(err, WebhookError::UnexpectedStatus { status: 401, .. }));
        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"));
    }

    #[test]
    fn test_notice_text_names_item() {
        let text = notice_text(&notice());
        assert!(text.starts_with("Product Burger (p-1)"));
        assert!(text.contains("Downtown"));

        let mut unnamed = notice();
        unnamed.item_name = None;
        unnamed.target = StopListTarget::Attribute;
        assert!(notice_text(&unnamed).starts_with("Modifier p-1 "));
    }
}
