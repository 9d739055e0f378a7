use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ECHO_WINDOW_MS: u64 = 5_000;
pub const DEFAULT_SUMMARY_POLL_SCHEDULE_MS: [u64; 5] = [1_000, 2_000, 3_000, 5_000, 8_000];

/// Runtime settings for the sync core.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a local action suppresses the side effects of its echo.
    pub echo_window_ms: u64,
    /// Delays between summary status checks. Polling stops after the last one.
    pub summary_poll_schedule_ms: Vec<u64>,
    /// Whether the chat store writes its state through the repository.
    pub persist_chat: bool,
    /// Overrides the default chat state file location.
    pub state_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            echo_window_ms: DEFAULT_ECHO_WINDOW_MS,
            summary_poll_schedule_ms: DEFAULT_SUMMARY_POLL_SCHEDULE_MS.to_vec(),
            persist_chat: true,
            state_file: None,
        }
    }
}

impl SyncConfig {
    pub fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }

    pub fn summary_poll_schedule(&self) -> Vec<Duration> {
        self.summary_poll_schedule_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    /// Rejects settings the stores cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.echo_window_ms == 0 {
            return Err(SyncError::config("echo_window_ms must be greater than zero"));
        }
        if self.summary_poll_schedule_ms.is_empty() {
            return Err(SyncError::config("summary_poll_schedule_ms must not be empty"));
        }
        if self
            .summary_poll_schedule_ms
            .windows(2)
            .any(|pair| pair[1] < pair[0])
        {
            return Err(SyncError::config(
                "summary_poll_schedule_ms must be non-decreasing",
            ));
        }
        Ok(())
    }
}
