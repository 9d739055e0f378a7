//! Default locations for dealsync files.
//!
//! Directories come from `AppPaths` (XDG on Linux/macOS, the platform
//! convention elsewhere):
//!
//! ```text
//! ~/.config/dealsync/
//! ├── config.toml         # SyncConfig overrides
//! └── chat_state.json     # persisted chat snapshot
//! ```

use dealsync_core::error::{Result, SyncError};
use std::path::{Path, PathBuf};
use version_migrate::AppPaths;

const APP_NAME: &str = "dealsync";
const CONFIG_FILE: &str = "config.toml";
const CHAT_STATE_FILE: &str = "chat_state.json";

pub struct DealsyncPaths;

impl DealsyncPaths {
    fn app_paths() -> AppPaths {
        AppPaths::new(APP_NAME)
    }

    pub fn config_dir() -> Result<PathBuf> {
        Self::app_paths()
            .config_dir()
            .map_err(|_| SyncError::config("Cannot find home directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn chat_state_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CHAT_STATE_FILE))
    }

    /// Expands a leading `~/` to the home directory. Other paths are returned as-is.
    pub fn expand_home(path: &Path) -> PathBuf {
        match (path.strip_prefix("~"), dirs::home_dir()) {
            (Ok(rest), Some(home)) => home.join(rest),
            _ => path.to_path_buf(),
        }
    }
}
