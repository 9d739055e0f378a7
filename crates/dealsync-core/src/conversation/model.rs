//! Conversation entity.

use super::message::{Message, Sender};
use crate::entity::{merge_field, Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used until the first user message names the conversation.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";

const TITLE_MAX_CHARS: usize = 48;

/// A chat conversation. Owns its messages in arrival order.
///
/// A conversation is only ever destroyed by explicit deletion; clearing it
/// empties the message list but keeps the conversation (and any scope that
/// points at it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for [`Conversation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationPatch {
    pub title: Option<String>,
}

impl Conversation {
    /// Creates an empty conversation with a fresh id.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends `message` unless a message with the same id is already present.
    ///
    /// The first user message also becomes the title of an untitled conversation.
    /// Returns `true` when the message was appended.
    pub fn push_message(&mut self, message: Message) -> bool {
        if self.contains_message(&message.id) {
            return false;
        }
        if message.sender == Sender::User && self.title == DEFAULT_CONVERSATION_TITLE {
            self.title = derive_title(&message.text);
        }
        self.updated_at = message.timestamp.max(self.updated_at);
        self.messages.push(message);
        true
    }

    pub fn contains_message(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Empties the message list. Returns `false` when it was already empty.
    pub fn clear_messages(&mut self) -> bool {
        if self.messages.is_empty() {
            return false;
        }
        self.messages.clear();
        self.updated_at = Utc::now();
        true
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for Conversation {
    type Patch = ConversationPatch;
    const ENTITY_TYPE: &'static str = "Conversation";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &ConversationPatch) -> bool {
        let changed = merge_field(&mut self.title, &patch.title);
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

fn derive_title(text: &str) -> String {
    let first_line = text.lines().map(str::trim).find(|line| !line.is_empty());
    let Some(line) = first_line else {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    };
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let truncated: String = line.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", truncated.trim_end())
}
