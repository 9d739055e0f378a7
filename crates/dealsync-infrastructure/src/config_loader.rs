//! Loads [`SyncConfig`] from TOML.

use crate::paths::DealsyncPaths;
use dealsync_core::config::SyncConfig;
use dealsync_core::error::{Result, SyncError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads the configuration.
///
/// An explicit `path` must exist. Without one, the default config file is
/// read when present and defaults are used otherwise. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let config = match path {
        Some(path) => {
            let path = DealsyncPaths::expand_home(path);
            let content = std::fs::read_to_string(&path).map_err(|e| {
                SyncError::config(format!("Cannot read {}: {}", path.display(), e))
            })?;
            parse(&content, &path)?
        }
        None => load_default()?,
    };
    config.validate()?;
    Ok(config)
}

fn load_default() -> Result<SyncConfig> {
    let path = DealsyncPaths::config_file()?;
    match std::fs::read_to_string(&path) {
        Ok(content) => parse(&content, &path),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("[Config] No config at {}, using defaults", path.display());
            Ok(SyncConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn parse(content: &str, path: &Path) -> Result<SyncConfig> {
    let config: SyncConfig = toml::from_str(content)?;
    info!("[Config] Loaded {}", path.display());
    Ok(config)
}

/// Where the chat snapshot lives: the configured override or the default file.
pub fn resolve_state_file(config: &SyncConfig) -> Result<PathBuf> {
    match &config.state_file {
        Some(path) => Ok(DealsyncPaths::expand_home(path)),
        None => DealsyncPaths::chat_state_file(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dealsync.toml");
        std::fs::write(
            &path,
            "echo_window_ms = 2000\nsummary_poll_schedule_ms = [500, 500, 1000]\nstate_file = \"/tmp/chat.json\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.echo_window_ms, 2000);
        assert_eq!(config.summary_poll_schedule_ms, vec![500, 500, 1000]);
        assert!(config.persist_chat);
        assert_eq!(
            resolve_state_file(&config).unwrap(),
            PathBuf::from("/tmp/chat.json")
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dealsync.toml");
        std::fs::write(&path, "echo_window_ms = 0\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)).unwrap_err(),
            SyncError::Config(_)
        ));

        std::fs::write(&path, "echo_window_ms = \"soon\"\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)).unwrap_err(),
            SyncError::Serialization { .. }
        ));
    }
}
