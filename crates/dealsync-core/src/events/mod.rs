//! Transport event vocabulary: names, payloads, and the snake_case field
//! mapping tables used by `entity:updated` style pushes.

mod field_map;
mod inbound;
mod names;
mod payload;

pub use field_map::{
    map_fields, FieldMapping, MappedFields, DOCUMENT_FIELDS, TRANSACTION_FIELDS,
};
pub use inbound::InboundEvent;
pub use names::EventName;
pub use payload::{
    synthesize_notification_id, ChatMessagePayload, ChatSendPayload, ChatTypingPayload,
    EntityDeletedPayload, EntityUpdatedPayload, NotificationNewPayload, NotificationReadPayload,
    ProgressPayload, ScopeEntityPayload, ScopeEntityType,
};
