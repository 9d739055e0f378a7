//! JSON file implementation of [`ChatStateRepository`].

use super::atomic_file::{read_optional, write_atomic};
use crate::dto::{
    create_chat_state_migrator, CHAT_STATE_ENTITY, CURRENT_CHAT_STATE_VERSION,
    MIN_SUPPORTED_CHAT_STATE_VERSION,
};
use async_trait::async_trait;
use dealsync_core::conversation::{ChatStateRepository, PersistedChat};
use dealsync_core::error::{Result, SyncError};
use semver::Version;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How a stored snapshot was brought to the current schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Stored at the current version.
    Current,
    /// Migrated forward from an older supported version.
    Migrated { from: Version },
    /// Too old, unversioned or unreadable; replaced by an empty snapshot.
    /// The file is rewritten unless the repository is read-only.
    Reset { reason: String },
}

/// A loaded snapshot together with how it was obtained.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub state: PersistedChat,
    pub outcome: LoadOutcome,
}

enum VersionCheck {
    Supported(Version),
    Unsupported(String),
}

/// Stores the chat snapshot as a single versioned JSON document.
///
/// Writes go through a temporary file and an atomic rename. Concurrent saves
/// from the same process are serialized.
pub struct JsonChatStateRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
    persist_resets: bool,
}

impl JsonChatStateRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            persist_resets: true,
        }
    }

    /// Reports resets without rewriting the file.
    pub fn read_only(mut self) -> Self {
        self.persist_resets = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and migrates the stored snapshot, reporting what happened.
    ///
    /// Snapshots below the oldest supported version (or without a usable
    /// version) are hard-reset: the file is rewritten empty. Snapshots from a
    /// newer build are left untouched and reported as a migration error.
    pub async fn load_report(&self) -> Result<Option<LoadReport>> {
        let Some(content) = read_optional(&self.path).await? else {
            debug!("[ChatStateRepository] No snapshot at {}", self.path.display());
            return Ok(None);
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => return self.reset(format!("unreadable JSON: {}", e)).await.map(Some),
        };

        let version = match check_version(&value)? {
            VersionCheck::Supported(version) => version,
            VersionCheck::Unsupported(reason) => return self.reset(reason).await.map(Some),
        };

        let migrator = create_chat_state_migrator()?;
        let mut state: PersistedChat = migrator.load_flat_from(CHAT_STATE_ENTITY, value)?;
        let dropped = state.prune_dangling();
        if dropped > 0 {
            warn!(
                "[ChatStateRepository] Dropped {} dangling conversation reference(s)",
                dropped
            );
        }

        let outcome = if version == known_version(CURRENT_CHAT_STATE_VERSION)? {
            LoadOutcome::Current
        } else {
            info!(
                "[ChatStateRepository] Migrated chat state from {} to {}",
                version, CURRENT_CHAT_STATE_VERSION
            );
            LoadOutcome::Migrated { from: version }
        };
        Ok(Some(LoadReport { state, outcome }))
    }

    async fn reset(&self, reason: String) -> Result<LoadReport> {
        warn!(
            "[ChatStateRepository] Resetting chat state at {}: {}",
            self.path.display(),
            reason
        );
        let state = PersistedChat::default();
        if self.persist_resets {
            self.save(&state).await?;
        }
        Ok(LoadReport {
            state,
            outcome: LoadOutcome::Reset { reason },
        })
    }
}

#[async_trait]
impl ChatStateRepository for JsonChatStateRepository {
    async fn load(&self) -> Result<Option<PersistedChat>> {
        Ok(self.load_report().await?.map(|report| report.state))
    }

    async fn save(&self, state: &PersistedChat) -> Result<()> {
        let migrator = create_chat_state_migrator()?;
        let json = migrator.save_domain_flat(CHAT_STATE_ENTITY, state)?;

        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, json.as_bytes()).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn known_version(raw: &'static str) -> Result<Version> {
    Version::parse(raw)
        .map_err(|e| SyncError::internal(format!("Bad chat state version '{}': {}", raw, e)))
}

fn check_version(value: &Value) -> Result<VersionCheck> {
    let Some(raw) = value.get("version").and_then(Value::as_str) else {
        return Ok(VersionCheck::Unsupported("missing version".to_string()));
    };
    let Ok(version) = Version::parse(raw) else {
        return Ok(VersionCheck::Unsupported(format!("unparsable version '{}'", raw)));
    };

    let minimum = known_version(MIN_SUPPORTED_CHAT_STATE_VERSION)?;
    let current = known_version(CURRENT_CHAT_STATE_VERSION)?;
    if version < minimum {
        return Ok(VersionCheck::Unsupported(format!(
            "version {} is older than {}",
            version, minimum
        )));
    }
    if version > current {
        return Err(SyncError::migration(format!(
            "chat state version {} is newer than {}",
            version, current
        )));
    }
    Ok(VersionCheck::Supported(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealsync_core::conversation::{Conversation, Message};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn repository(dir: &TempDir) -> JsonChatStateRepository {
        JsonChatStateRepository::new(dir.path().join("chat_state.json"))
    }

    fn write_raw(repo: &JsonChatStateRepository, value: serde_json::Value) {
        std::fs::write(repo.path(), value.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        assert!(repository(&dir).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir);

        let mut conversation = Conversation::new();
        conversation.push_message(Message::user("Hello"));
        let state = PersistedChat {
            current_conversation_id: Some(conversation.id.clone()),
            scope_conversations: BTreeMap::from([("global".to_string(), conversation.id.clone())]),
            conversations: vec![conversation],
        };
        repo.save(&state).await.unwrap();

        let report = repo.load_report().await.unwrap().unwrap();
        assert_eq!(report.outcome, LoadOutcome::Current);
        assert_eq!(report.state, state);

        let raw = std::fs::read_to_string(repo.path()).unwrap();
        assert!(raw.contains("\"version\":\"3.0.0\""));
    }

    #[tokio::test]
    async fn test_v2_file_is_migrated() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir);
        write_raw(
            &repo,
            json!({
                "version": "2.0.0",
                "conversations": [{
                    "id": "c2",
                    "title": "Deal chat",
                    "messages": [],
                    "created_at": "2024-03-01T09:00:00Z",
                    "updated_at": "2024-03-01T09:00:00Z",
                    "scope_key": "scope:42"
                }],
                "current_conversation_id": "c2"
            }),
        );

        let report = repo.load_report().await.unwrap().unwrap();
        assert_eq!(
            report.outcome,
            LoadOutcome::Migrated {
                from: Version::new(2, 0, 0)
            }
        );
        assert_eq!(report.state.scope_conversations["scope:42"], "c2");
    }

    #[tokio::test]
    async fn test_v1_file_is_hard_reset() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir);
        write_raw(&repo, json!({ "version": "1.0.0", "messages": ["legacy"] }));

        let report = repo.load_report().await.unwrap().unwrap();
        assert!(matches!(report.outcome, LoadOutcome::Reset { .. }));
        assert!(report.state.is_empty());

        let report = repo.load_report().await.unwrap().unwrap();
        assert_eq!(report.outcome, LoadOutcome::Current);
    }

    #[tokio::test]
    async fn test_read_only_reset_keeps_file() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir).read_only();
        write_raw(&repo, json!({ "version": "1.2.0" }));

        let report = repo.load_report().await.unwrap().unwrap();
        assert!(matches!(report.outcome, LoadOutcome::Reset { .. }));
        let raw = std::fs::read_to_string(repo.path()).unwrap();
        assert!(raw.contains("1.2.0"));
    }

    #[tokio::test]
    async fn test_unversioned_and_garbage_files_reset() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir);

        write_raw(&repo, json!({ "conversations": [] }));
        let report = repo.load_report().await.unwrap().unwrap();
        assert!(matches!(report.outcome, LoadOutcome::Reset { .. }));

        std::fs::write(repo.path(), "{ not json").unwrap();
        let report = repo.load_report().await.unwrap().unwrap();
        assert!(matches!(report.outcome, LoadOutcome::Reset { .. }));

        write_raw(&repo, json!({ "version": "two" }));
        let report = repo.load_report().await.unwrap().unwrap();
        assert!(matches!(report.outcome, LoadOutcome::Reset { .. }));
    }

    #[tokio::test]
    async fn test_newer_version_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir);
        write_raw(&repo, json!({ "version": "4.1.0", "conversations": [] }));

        let err = repo.load().await.unwrap_err();
        assert!(matches!(err, SyncError::Migration(_)));
        let raw = std::fs::read_to_string(repo.path()).unwrap();
        assert!(raw.contains("4.1.0"));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir);
        repo.save(&PersistedChat::default()).await.unwrap();

        repo.clear().await.unwrap();
        repo.clear().await.unwrap();
        assert!(repo.load().await.unwrap().is_none());
    }
}
