pub mod inspect;
pub mod migrate;
pub mod offline;
pub mod replay;

use anyhow::Result;
use dealsync_core::config::SyncConfig;
use std::path::PathBuf;

/// The explicit file when given, the configured chat state file otherwise.
pub fn state_file(config: &SyncConfig, file: Option<PathBuf>) -> Result<PathBuf> {
    match file {
        Some(file) => Ok(file),
        None => Ok(dealsync_infrastructure::config_loader::resolve_state_file(config)?),
    }
}
