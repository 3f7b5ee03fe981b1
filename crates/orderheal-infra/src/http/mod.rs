//! reqwest clients for the POS, the stop-list service, incident channels
//! and the order-status API

pub mod pos;
pub mod stoplist;
pub mod incidents;
pub mod status;

use orderheal_webhook::WebhookError;
use reqwest::{Client, Response};
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> orderheal_webhook::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| WebhookError::Http(e.to_string()))
}

/// Non-2xx responses become `UnexpectedStatus`
pub(crate) fn ensure_success(response: Response, url: &str) -> orderheal_webhook::Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(WebhookError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}
