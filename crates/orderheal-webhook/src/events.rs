//! Webhook event types
//!
//! Defines the POS webhook envelope and its event payloads.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

use crate::{Result, WebhookError};

/// Webhook event kinds accepted from the POS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    StopListUpdate,
    DeliveryOrderUpdate,
    DeliveryOrderError,
    TableOrderUpdate,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopListUpdate => "StopListUpdate",
            Self::DeliveryOrderUpdate => "DeliveryOrderUpdate",
            Self::DeliveryOrderError => "DeliveryOrderError",
            Self::TableOrderUpdate => "TableOrderUpdate",
        }
    }
}

/// Whether the POS managed to create the order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CreationStatus {
    Success,
    Error,
    InProgress,
    Other(String),
}

impl From<String> for CreationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Success" => Self::Success,
            "Error" => Self::Error,
            "InProgress" => Self::InProgress,
            _ => Self::Other(value),
        }
    }
}

impl From<CreationStatus> for String {
    fn from(value: CreationStatus) -> Self {
        match value {
            CreationStatus::Success => "Success".to_string(),
            CreationStatus::Error => "Error".to_string(),
            CreationStatus::InProgress => "InProgress".to_string(),
            CreationStatus::Other(s) => s,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// POS error attached to a failed order creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    /// Free text, sometimes a JSON-encoded object carrying its own `message`
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: &str, description: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            description: description.to_string(),
        }
    }

    /// The message with one level of JSON encoding removed, if present.
    ///
    /// Malformed JSON is treated as plain text.
    pub fn message_text(&self) -> Cow<'_, str> {
        match serde_json::from_str::<serde_json::Value>(&self.message) {
            Ok(serde_json::Value::Object(map)) => match map.get("message") {
                Some(serde_json::Value::String(inner)) => Cow::Owned(inner.clone()),
                _ => Cow::Borrowed(self.message.as_str()),
            },
            Ok(serde_json::Value::String(inner)) => Cow::Owned(inner),
            _ => Cow::Borrowed(self.message.as_str()),
        }
    }

    /// Message and description joined, as scanned by the classifier
    pub fn raw_text(&self) -> String {
        let message = self.message_text();
        match (message.is_empty(), self.description.is_empty()) {
            (_, true) => message.into_owned(),
            (true, false) => self.description.clone(),
            (false, false) => format!("{} {}", message, self.description),
        }
    }

    /// True when the error is the POS creation-timeout sentinel
    pub fn is_timeout(&self, sentinel: &str) -> bool {
        self.message_text() == sentinel || self.raw_text() == sentinel
    }
}

/// Order body as reported by the POS; unknown fields are kept verbatim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosOrderBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    /// POS order id
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_status: Option<CreationStatus>,
    #[serde(default)]
    pub error_info: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<PosOrderBody>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventInfo {
    pub fn is_creation_error(&self) -> bool {
        matches!(self.creation_status, Some(CreationStatus::Error))
    }

    pub fn order_status(&self) -> Option<&str> {
        self.order.as_ref().and_then(|o| o.status.as_deref())
    }
}

/// Webhook event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "eventType")]
    pub event_kind: EventKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub organization_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub correlation_id: String,
    #[serde(default)]
    pub event_info: EventInfo,
}

impl WebhookEvent {
    pub fn new(event_kind: EventKind, event_info: EventInfo) -> Self {
        Self {
            event_kind,
            event_time: String::new(),
            organization_id: event_info.organization_id.clone(),
            correlation_id: String::new(),
            event_info,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: &str) -> Self {
        self.correlation_id = correlation_id.to_string();
        self
    }

    /// Organization of the order, preferring the payload over the envelope
    pub fn pos_organization_id(&self) -> &str {
        if self.event_info.organization_id.is_empty() {
            &self.organization_id
        } else {
            &self.event_info.organization_id
        }
    }
}

/// One element of an inbound batch
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    Known(WebhookEvent),
    /// Unknown or malformed event; reported as failed, never dropped
    Unrecognized { event_type: String, reason: String },
}

impl RawEvent {
    pub fn from_value(value: serde_json::Value) -> Self {
        let event_type = value
            .get("eventType")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        match serde_json::from_value::<WebhookEvent>(value) {
            Ok(event) => RawEvent::Known(event),
            Err(e) => RawEvent::Unrecognized {
                event_type,
                reason: e.to_string(),
            },
        }
    }

    /// Parse a JSON array body into per-element events
    pub fn parse_batch(body: &[u8]) -> Result<Vec<RawEvent>> {
        let values: Vec<serde_json::Value> = serde_json::from_slice(body)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        Ok(values.into_iter().map(RawEvent::from_value).collect())
    }

    pub fn kind_name(&self) -> &str {
        match self {
            RawEvent::Known(event) => event.event_kind.as_str(),
            RawEvent::Unrecognized { event_type, .. } => event_type,
        }
    }
}

impl From<WebhookEvent> for RawEvent {
    fn from(event: WebhookEvent) -> Self {
        RawEvent::Known(event)
    }
}

/// Which order flow an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderContext {
    Delivery,
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_delivery_error_event() {
        let body = json!([{
            "eventType": "DeliveryOrderError",
            "eventTime": "2024-03-01 12:00:00.000",
            "organizationId": "org-1",
            "correlationId": "corr-1",
            "eventInfo": {
                "id": "pos-1",
                "organizationId": "org-1",
                "posId": "pos-terminal",
                "timestamp": 1709294400000i64,
                "creationStatus": "Error",
                "errorInfo": {
                    "code": "CreationError",
                    "message": "Creation timeout",
                    "description": null
                },
                "order": null
            }
        }]);

        let events = RawEvent::parse_batch(body.to_string().as_bytes()).unwrap();
        assert_eq!(events.len(), 1);

        let RawEvent::Known(event) = &events[0] else {
            panic!("expected a known event");
        };
        assert_eq!(event.event_kind, EventKind::DeliveryOrderError);
        assert!(event.event_info.is_creation_error());

        let error = event.event_info.error_info.as_ref().unwrap();
        assert_eq!(error.description, "");
        assert!(error.is_timeout("Creation timeout"));
    }

    #[test]
    fn test_unknown_kind_is_unrecognized() {
        let body = json!([
            {"eventType": "ReserveUpdate", "eventInfo": {}},
            {"eventType": "StopListUpdate", "organizationId": "org-1", "eventInfo": {}}
        ]);

        let events = RawEvent::parse_batch(body.to_string().as_bytes()).unwrap();
        assert!(matches!(&events[0], RawEvent::Unrecognized { event_type, .. } if event_type == "ReserveUpdate"));
        assert_eq!(events[1].kind_name(), "StopListUpdate");
    }

    #[test]
    fn test_non_array_body_rejected() {
        let result = RawEvent::parse_batch(br#"{"eventType":"StopListUpdate"}"#);
        assert!(matches!(result, Err(WebhookError::InvalidPayload(_))));
    }

    #[test]
    fn test_message_text_unwraps_json() {
        let error = ErrorInfo::new("X", r#"{"message":"Creation timeout","code":"T"}"#, "");
        assert_eq!(error.message_text(), "Creation timeout");
        assert!(error.is_timeout("Creation timeout"));

        let malformed = ErrorInfo::new("X", r#"{"message": "broken"#, "");
        assert_eq!(malformed.message_text(), r#"{"message": "broken"#);
        assert!(!malformed.is_timeout("Creation timeout"));
    }

    #[test]
    fn test_raw_text_joins_fields() {
        let error = ErrorInfo::new("4", "Product not found", "id=abc");
        assert_eq!(error.raw_text(), "Product not found id=abc");
        assert!(!error.is_timeout("Creation timeout"));
    }

    #[test]
    fn test_order_body_round_trips_unknown_fields() {
        let info: EventInfo = serde_json::from_value(json!({
            "id": "pos-1",
            "creationStatus": "Success",
            "order": {"status": "CookingStarted", "sum": 1200}
        }))
        .unwrap();

        assert_eq!(info.order_status(), Some("CookingStarted"));
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["order"]["sum"], 1200);
        assert_eq!(value["creationStatus"], "Success");
    }
}
