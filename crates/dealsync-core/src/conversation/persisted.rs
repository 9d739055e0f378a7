//! Chat state that survives a reload.

use super::model::Conversation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the chat store written to local storage.
///
/// This is the domain side of the persisted schema; versioning and migration
/// live in the infrastructure DTOs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedChat {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub current_conversation_id: Option<String>,
    /// ScopeKey string → conversation id.
    #[serde(default)]
    pub scope_conversations: BTreeMap<String, String>,
}

impl PersistedChat {
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
            && self.current_conversation_id.is_none()
            && self.scope_conversations.is_empty()
    }

    /// Drops references to conversations that are not part of the snapshot.
    ///
    /// Storage written by older builds can contain a current id or map entries
    /// for conversations that were deleted without the map being updated.
    pub fn prune_dangling(&mut self) -> usize {
        let conversations = &self.conversations;
        let known = |id: &String| conversations.iter().any(|c| &c.id == id);
        let mut dropped = 0;

        if self
            .current_conversation_id
            .as_ref()
            .is_some_and(|current| !known(current))
        {
            self.current_conversation_id = None;
            dropped += 1;
        }

        let before = self.scope_conversations.len();
        self.scope_conversations.retain(|_, id| known(id));
        dropped + (before - self.scope_conversations.len())
    }
}
