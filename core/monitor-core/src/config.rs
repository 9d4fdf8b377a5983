//! Configuration loading and saving utilities.
//!
//! `config.json` under the monitor root tunes staleness, the display priority
//! and lock behaviour. Every field has a default, and a missing or broken file
//! yields the defaults so the hook and the renderer never fail on config.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::storage::StorageConfig;
use crate::types::SessionState;

pub const DEFAULT_STALE_AFTER_SECS: i64 = 30 * 60;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_LOCK_RETRIES: u32 = 3;

/// Most attention-worthy first.
pub const DEFAULT_STATE_PRIORITY: [SessionState; 5] = [
    SessionState::Error,
    SessionState::WaitingInput,
    SessionState::Thinking,
    SessionState::Starting,
    SessionState::Idle,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sessions quiet for this long drop out of the aggregated status.
    pub stale_after_secs: i64,
    /// Dominant-state order for the aggregated status. States missing from
    /// the list rank below every listed state.
    pub state_priority: Vec<SessionState>,
    pub lock_timeout_ms: u64,
    /// How often a hook retries after a lock timeout before dropping its event.
    pub lock_retries: u32,
    /// Remove stale and finished sessions from the store while rendering.
    pub gc_stale_sessions: bool,
    /// Program registered in settings.json. Defaults to ~/.local/bin/claude-monitor.
    pub hook_program: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            state_priority: DEFAULT_STATE_PRIORITY.to_vec(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            lock_retries: DEFAULT_LOCK_RETRIES,
            gc_stale_sessions: true,
            hook_program: None,
        }
    }
}

impl MonitorConfig {
    /// Loads the configuration, returning defaults if the file is missing or unreadable.
    pub fn load(storage: &StorageConfig) -> Self {
        let path = storage.config_file();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read config, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str::<MonitorConfig>(&content) {
            Ok(config) => config.sanitized(),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to parse config, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Saves the configuration to disk.
    pub fn save(&self, storage: &StorageConfig) -> Result<()> {
        fs::create_dir_all(storage.root()).map_err(MonitorError::io("create monitor root"))?;
        let content =
            serde_json::to_string_pretty(self).map_err(MonitorError::json("serialize config"))?;
        fs::write(storage.config_file(), content).map_err(MonitorError::io("write config"))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn hook_program(&self, storage: &StorageConfig) -> PathBuf {
        self.hook_program
            .clone()
            .unwrap_or_else(|| storage.default_hook_program())
    }

    /// Rank of a state in the display priority; lower is more important.
    pub fn priority_rank(&self, state: SessionState) -> usize {
        self.state_priority
            .iter()
            .position(|s| *s == state)
            .unwrap_or(self.state_priority.len())
    }

    fn sanitized(mut self) -> Self {
        if self.stale_after_secs <= 0 {
            tracing::warn!(
                stale_after_secs = self.stale_after_secs,
                "Non-positive staleness threshold, using default"
            );
            self.stale_after_secs = DEFAULT_STALE_AFTER_SECS;
        }
        let mut seen = Vec::with_capacity(self.state_priority.len());
        self.state_priority.retain(|state| {
            if seen.contains(state) {
                false
            } else {
                seen.push(*state);
                true
            }
        });
        self
    }
}
