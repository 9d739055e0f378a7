//! Chat state DTOs and migrations
//!
//! V1.x payloads predate the scope-aware chat and are not migrated; callers
//! reset them to an empty snapshot (see [`MIN_SUPPORTED_CHAT_STATE_VERSION`]).

use chrono::{DateTime, Utc};
use dealsync_core::conversation::{
    Conversation, Message, PersistedChat, DEFAULT_CONVERSATION_TITLE,
};
use dealsync_core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use version_migrate::{FromDomain, IntoDomain, MigratesTo, Versioned};

/// Entity name registered with the migrator.
pub const CHAT_STATE_ENTITY: &str = "chat_state";

/// Oldest schema version that still has a migration path.
pub const MIN_SUPPORTED_CHAT_STATE_VERSION: &str = "2.0.0";

/// Version written by this build.
pub const CURRENT_CHAT_STATE_VERSION: &str = "3.0.0";

/// Conversation as stored by V2.0.0, tagged with the scope it belonged to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationV2 {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Legacy per-conversation scope tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_key: Option<String>,
}

/// Chat state V2.0.0.
///
/// Scope routing lived on the conversations themselves; at most one
/// conversation per tag was meant to exist but nothing enforced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "2.0.0")]
pub struct ChatStateV2_0_0 {
    #[serde(default)]
    pub conversations: Vec<ConversationV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_conversation_id: Option<String>,
}

/// Chat state V3.0.0.
///
/// Moved scope routing into an explicit scope-key → conversation map and
/// switched to camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "3.0.0")]
#[serde(rename_all = "camelCase")]
pub struct ChatStateV3_0_0 {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_conversation_id: Option<String>,
    #[serde(default)]
    pub scope_conversations: BTreeMap<String, String>,
}

/// Type alias for the latest chat state version.
pub type ChatStateDTO = ChatStateV3_0_0;

// ============================================================================
// Migration implementations
// ============================================================================

/// Migration from ChatStateV2_0_0 to ChatStateV3_0_0.
///
/// Every distinct tag becomes one map entry. When several conversations carry
/// the same tag, the most recently updated one wins; ties keep the earlier
/// conversation.
impl MigratesTo<ChatStateV3_0_0> for ChatStateV2_0_0 {
    fn migrate(self) -> ChatStateV3_0_0 {
        let mut winners: BTreeMap<String, (String, DateTime<Utc>)> = BTreeMap::new();
        for legacy in &self.conversations {
            let Some(tag) = legacy.scope_key.as_deref().map(str::trim) else {
                continue;
            };
            if tag.is_empty() {
                continue;
            }
            let newer = winners
                .get(tag)
                .is_none_or(|(_, updated_at)| legacy.updated_at > *updated_at);
            if newer {
                winners.insert(tag.to_string(), (legacy.id.clone(), legacy.updated_at));
            }
        }

        ChatStateV3_0_0 {
            conversations: self.conversations.into_iter().map(Into::into).collect(),
            current_conversation_id: self.current_conversation_id,
            scope_conversations: winners
                .into_iter()
                .map(|(tag, (id, _))| (tag, id))
                .collect(),
        }
    }
}

impl From<ConversationV2> for Conversation {
    fn from(legacy: ConversationV2) -> Self {
        let title = if legacy.title.trim().is_empty() {
            DEFAULT_CONVERSATION_TITLE.to_string()
        } else {
            legacy.title
        };
        Conversation {
            id: legacy.id,
            title,
            messages: legacy.messages,
            created_at: legacy.created_at,
            updated_at: legacy.updated_at,
        }
    }
}

// ============================================================================
// Domain model conversions
// ============================================================================

impl IntoDomain<PersistedChat> for ChatStateV3_0_0 {
    fn into_domain(self) -> PersistedChat {
        PersistedChat {
            conversations: self.conversations,
            current_conversation_id: self.current_conversation_id,
            scope_conversations: self.scope_conversations,
        }
    }
}

impl FromDomain<PersistedChat> for ChatStateV3_0_0 {
    fn from_domain(state: PersistedChat) -> Self {
        ChatStateV3_0_0 {
            conversations: state.conversations,
            current_conversation_id: state.current_conversation_id,
            scope_conversations: state.scope_conversations,
        }
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Creates a Migrator for persisted chat state.
///
/// # Migration Path
///
/// - V2.0.0 → V3.0.0: Builds the scope map from legacy per-conversation tags
/// - V3.0.0 → PersistedChat: Converts DTO to domain model
///
/// # Example
///
/// ```ignore
/// let migrator = create_chat_state_migrator()?;
/// let state: PersistedChat = migrator.load_flat_from(CHAT_STATE_ENTITY, json_value)?;
/// ```
pub fn create_chat_state_migrator() -> Result<version_migrate::Migrator> {
    let mut migrator = version_migrate::Migrator::builder().build();

    let chat_state_path = version_migrate::Migrator::define(CHAT_STATE_ENTITY)
        .from::<ChatStateV2_0_0>()
        .step::<ChatStateV3_0_0>()
        .into_with_save::<PersistedChat>();

    migrator.register(chat_state_path)?;
    Ok(migrator)
}
