//! Inbound webhook handling
//!
//! Receives POS webhook batches over HTTP and hands them to the [`Dispatcher`].

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    dispatcher::{DispatchError, Dispatcher},
    events::RawEvent,
};

pub const WEBHOOK_PATH: &str = "/webhooks/iiko";

/// Create Axum router for POS webhooks
pub fn create_webhook_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(handle_webhook))
        .with_state(dispatcher)
}

async fn handle_webhook(State(dispatcher): State<Arc<Dispatcher>>, body: Bytes) -> Response {
    let events = match RawEvent::parse_batch(&body) {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "Rejected webhook payload");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    info!(events = events.len(), "Received webhook batch");

    match dispatcher.dispatch(events).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e @ DispatchError::EmptyBatch) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e @ DispatchError::EmptyResult) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
