use strum::{Display, EnumString, IntoStaticStr};

/// Every event name exchanged over the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum EventName {
    #[strum(serialize = "entity:progress")]
    EntityProgress,
    #[strum(serialize = "entity:updated")]
    EntityUpdated,
    #[strum(serialize = "entity:deleted")]
    EntityDeleted,
    #[strum(serialize = "notification:new")]
    NotificationNew,
    #[strum(serialize = "notification:read")]
    NotificationRead,
    #[strum(serialize = "notification:all-read")]
    NotificationAllRead,
    #[strum(serialize = "chat:message")]
    ChatMessage,
    #[strum(serialize = "chat:typing")]
    ChatTyping,
    #[strum(serialize = "scope-entity:created")]
    ScopeEntityCreated,
    #[strum(serialize = "scope-entity:updated")]
    ScopeEntityUpdated,
    #[strum(serialize = "scope-entity:deleted")]
    ScopeEntityDeleted,
    /// Outgoing only.
    #[strum(serialize = "chat:send")]
    ChatSend,
}

impl EventName {
    /// Events the engine subscribes to, in subscription order.
    pub const INBOUND: [EventName; 11] = [
        EventName::EntityProgress,
        EventName::EntityUpdated,
        EventName::EntityDeleted,
        EventName::NotificationNew,
        EventName::NotificationRead,
        EventName::NotificationAllRead,
        EventName::ChatMessage,
        EventName::ChatTyping,
        EventName::ScopeEntityCreated,
        EventName::ScopeEntityUpdated,
        EventName::ScopeEntityDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn is_inbound(self) -> bool {
        !matches!(self, Self::ChatSend)
    }
}
