//! Notification entity.

use crate::entity::{merge_field, merge_optional_field, Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display priority of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Scope references carried by a notification, used for deep links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

/// A user notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Server-defined category, e.g. `document_processed`.
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub scope_refs: ScopeRefs,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: NotificationPriority,
    pub timestamp: DateTime<Utc>,
}

/// Partial update for [`Notification`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPatch {
    pub read: Option<bool>,
    pub read_at: Option<Option<DateTime<Utc>>>,
}

impl NotificationPatch {
    /// Patch that marks a notification read at `read_at`.
    pub fn mark_read(read_at: DateTime<Utc>) -> Self {
        Self {
            read: Some(true),
            read_at: Some(Some(read_at)),
        }
    }
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        !self.read
    }
}

impl Entity for Notification {
    type Patch = NotificationPatch;
    const ENTITY_TYPE: &'static str = "Notification";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &NotificationPatch) -> bool {
        let read = merge_field(&mut self.read, &patch.read);
        // Keep the first read timestamp; a later echo must not move it.
        let read_at = if self.read_at.is_some() && patch.read_at.as_ref().is_some_and(Option::is_some) {
            false
        } else {
            merge_optional_field(&mut self.read_at, &patch.read_at)
        };
        read || read_at
    }
}
