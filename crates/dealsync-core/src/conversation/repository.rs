//! Chat state repository trait.

use super::persisted::PersistedChat;
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for the chat snapshot.
///
/// Implementations own schema versioning: `load` must always return the
/// current domain shape, migrating older payloads forward and returning an
/// empty snapshot for payloads too old to migrate.
#[async_trait]
pub trait ChatStateRepository: Send + Sync {
    /// Loads the persisted snapshot.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(state))`: a snapshot was found (possibly migrated)
    /// - `Ok(None)`: nothing stored yet
    /// - `Err(_)`: storage could not be read
    async fn load(&self) -> Result<Option<PersistedChat>>;

    /// Writes `state` at the current schema version, replacing what was stored.
    async fn save(&self, state: &PersistedChat) -> Result<()>;

    /// Removes the stored snapshot (logout).
    async fn clear(&self) -> Result<()>;
}
