//! Push payload shapes.
//!
//! Payloads are deserialized leniently: a field with an unexpected type is
//! dropped with a warning and the rest of the payload still applies.

use crate::conversation::{Message, Sender};
use crate::notification::{Notification, NotificationPriority, ScopeRefs};
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!("[Payload] Dropping malformed field value {}: {}", value, err);
            None
        }
    }))
}

/// Accepts RFC 3339 strings and epoch milliseconds.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let parsed = parse_timestamp(&value);
        if parsed.is_none() && !value.is_null() {
            warn!("[Payload] Ignoring unparsable timestamp {}", value);
        }
        parsed
    }))
}

/// `entity:progress`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub entity_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub scope_id: Option<String>,
    /// Raw step name; unknown names are kept here and ignored downstream.
    #[serde(default, deserialize_with = "lenient")]
    pub step: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `entity:updated`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityUpdatedPayload {
    pub entity_id: String,
    /// snake_case field names, mapped through a static table.
    #[serde(default)]
    pub updates: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `entity:deleted`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDeletedPayload {
    pub entity_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub scope_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `notification:new`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationNewPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub document_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub read: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub priority: Option<NotificationPriority>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Synthesizes an id for a notification pushed without one:
/// `<timestamp-millis>-<random hex>`.
pub fn synthesize_notification_id(timestamp: DateTime<Utc>) -> String {
    format!("{}-{:08x}", timestamp.timestamp_millis(), rand::random::<u32>())
}

impl NotificationNewPayload {
    /// Builds the notification, substituting defaults for missing fields.
    pub fn into_notification(self, now: DateTime<Utc>) -> Notification {
        let timestamp = self.timestamp.unwrap_or(now);
        let id = match self.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => synthesize_notification_id(timestamp),
        };
        let title = self.title.unwrap_or_else(|| {
            warn!("[Payload] notification:new '{}' has no title", id);
            "Notification".to_string()
        });
        let read = self.read.unwrap_or(false);

        Notification {
            kind: self.kind.unwrap_or_else(|| "general".to_string()),
            title,
            message: self.message.unwrap_or_default(),
            scope_refs: ScopeRefs {
                transaction_id: self.transaction_id,
                document_id: self.document_id,
            },
            read,
            read_at: read.then_some(timestamp),
            priority: self.priority.unwrap_or_default(),
            timestamp,
            id,
        }
    }
}

/// `notification:read`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationReadPayload {
    pub id: String,
}

/// `chat:message`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default, deserialize_with = "lenient")]
    pub sender: Option<Sender>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub conversation_id: Option<String>,
}

impl ChatMessagePayload {
    /// Pushed messages default to the assistant when no sender is given.
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        Message {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            text: self.text,
            sender: self.sender.unwrap_or(Sender::Assistant),
            timestamp: self.timestamp.unwrap_or(now),
            conversation_id: self.conversation_id,
        }
    }
}

/// `chat:typing`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTypingPayload {
    pub is_typing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeEntityType {
    Document,
    Transaction,
    #[serde(other)]
    Other,
}

/// `scope-entity:created|updated|deleted`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeEntityPayload {
    pub entity_type: ScopeEntityType,
    #[serde(default, deserialize_with = "lenient")]
    pub entity_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub scope_id: Option<String>,
    /// Full entity (camelCase) for `created`.
    #[serde(default)]
    pub entity: Option<Value>,
    /// snake_case partial fields for `updated`.
    #[serde(default)]
    pub updates: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ScopeEntityPayload {
    /// Entity id from the payload, or from the embedded entity.
    pub fn resolved_id(&self) -> Option<String> {
        self.entity_id.clone().or_else(|| {
            self.entity
                .as_ref()
                .and_then(|entity| entity.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }
}

/// Outgoing `chat:send`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendPayload {
    pub conversation_id: String,
    pub message_id: String,
    pub text: String,
    pub scope_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
