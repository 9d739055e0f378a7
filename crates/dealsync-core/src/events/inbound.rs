use super::names::EventName;
use super::payload::{
    ChatMessagePayload, ChatTypingPayload, EntityDeletedPayload, EntityUpdatedPayload,
    NotificationNewPayload, NotificationReadPayload, ProgressPayload, ScopeEntityPayload,
};
use crate::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    EntityProgress(ProgressPayload),
    EntityUpdated(EntityUpdatedPayload),
    EntityDeleted(EntityDeletedPayload),
    NotificationNew(NotificationNewPayload),
    NotificationRead(NotificationReadPayload),
    NotificationAllRead,
    ChatMessage(ChatMessagePayload),
    ChatTyping(ChatTypingPayload),
    ScopeEntityCreated(ScopeEntityPayload),
    ScopeEntityUpdated(ScopeEntityPayload),
    ScopeEntityDeleted(ScopeEntityPayload),
}

fn decode<T: DeserializeOwned>(name: EventName, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|err| SyncError::invalid_payload(name.as_str(), err.to_string()))
}

impl InboundEvent {
    /// Decodes `payload` as the event `name`.
    pub fn parse(name: EventName, payload: Value) -> Result<Self> {
        let event = match name {
            EventName::EntityProgress => Self::EntityProgress(decode(name, payload)?),
            EventName::EntityUpdated => Self::EntityUpdated(decode(name, payload)?),
            EventName::EntityDeleted => Self::EntityDeleted(decode(name, payload)?),
            EventName::NotificationNew => Self::NotificationNew(decode(name, payload)?),
            EventName::NotificationRead => Self::NotificationRead(decode(name, payload)?),
            EventName::NotificationAllRead => Self::NotificationAllRead,
            EventName::ChatMessage => Self::ChatMessage(decode(name, payload)?),
            EventName::ChatTyping => Self::ChatTyping(decode(name, payload)?),
            EventName::ScopeEntityCreated => Self::ScopeEntityCreated(decode(name, payload)?),
            EventName::ScopeEntityUpdated => Self::ScopeEntityUpdated(decode(name, payload)?),
            EventName::ScopeEntityDeleted => Self::ScopeEntityDeleted(decode(name, payload)?),
            EventName::ChatSend => {
                return Err(SyncError::invalid_payload(
                    name.as_str(),
                    "outgoing event cannot be received",
                ));
            }
        };
        Ok(event)
    }

    pub fn name(&self) -> EventName {
        match self {
            Self::EntityProgress(_) => EventName::EntityProgress,
            Self::EntityUpdated(_) => EventName::EntityUpdated,
            Self::EntityDeleted(_) => EventName::EntityDeleted,
            Self::NotificationNew(_) => EventName::NotificationNew,
            Self::NotificationRead(_) => EventName::NotificationRead,
            Self::NotificationAllRead => EventName::NotificationAllRead,
            Self::ChatMessage(_) => EventName::ChatMessage,
            Self::ChatTyping(_) => EventName::ChatTyping,
            Self::ScopeEntityCreated(_) => EventName::ScopeEntityCreated,
            Self::ScopeEntityUpdated(_) => EventName::ScopeEntityUpdated,
            Self::ScopeEntityDeleted(_) => EventName::ScopeEntityDeleted,
        }
    }
}
