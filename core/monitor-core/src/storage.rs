//! Storage configuration and path management for claude-monitor.
//!
//! All path decisions live here so the hook, the renderer and setup agree on
//! where things are, and so tests can point everything at a temp directory.
//!
//! ## Layout
//!
//! ```text
//! ~/.claude-monitor/            (CLAUDE_MONITOR_HOME)
//! ├── sessions.json             session store document
//! ├── sessions.lock/            store lock directory (present while held)
//! ├── config.json               MonitorConfig
//! ├── backup_path.txt           last settings.json backup written by setup
//! └── debug.log                 tracing output
//!
//! ~/.claude/                    (CLAUDE_CONFIG_DIR)
//! └── settings.json             Claude Code settings (hooks are merged in)
//! ```

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{MonitorError, Result};

const MONITOR_HOME_ENV: &str = "CLAUDE_MONITOR_HOME";
const CLAUDE_CONFIG_ENV: &str = "CLAUDE_CONFIG_DIR";

/// Central configuration for all claude-monitor storage paths.
///
/// Production code uses [`StorageConfig::from_env`].
/// Tests use [`StorageConfig::with_roots`] for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for monitor data (default: ~/.claude-monitor)
    root: PathBuf,
    /// Root directory for Claude Code data (default: ~/.claude)
    claude_root: PathBuf,
}

impl StorageConfig {
    /// Resolves roots from the environment, falling back to the home directory.
    pub fn from_env() -> Result<Self> {
        let env_dir = |key: &str| {
            env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        let root = match env_dir(MONITOR_HOME_ENV) {
            Some(dir) => dir,
            None => dirs::home_dir()
                .ok_or(MonitorError::HomeDirNotFound)?
                .join(".claude-monitor"),
        };
        let claude_root = match env_dir(CLAUDE_CONFIG_ENV) {
            Some(dir) => dir,
            None => dirs::home_dir()
                .ok_or(MonitorError::HomeDirNotFound)?
                .join(".claude"),
        };

        Ok(Self { root, claude_root })
    }

    /// Creates a StorageConfig with both roots given explicitly.
    pub fn with_roots(root: PathBuf, claude_root: PathBuf) -> Self {
        Self { root, claude_root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Monitor Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to sessions.json (the session store document).
    pub fn sessions_file(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    /// Path to the lock directory guarding sessions.json.
    pub fn sessions_lock_dir(&self) -> PathBuf {
        self.root.join("sessions.lock")
    }

    /// Path to config.json (staleness, priority, lock tuning).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Path to the file recording the most recent settings backup.
    pub fn backup_record_file(&self) -> PathBuf {
        self.root.join("backup_path.txt")
    }

    pub fn log_file_name(&self) -> &'static str {
        "debug.log"
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Claude Code Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to Claude Code's settings file.
    pub fn claude_settings_file(&self) -> PathBuf {
        self.claude_root.join("settings.json")
    }

    /// Default install location of the hook program referenced from settings.json.
    pub fn default_hook_program(&self) -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".local/bin/claude-monitor"))
            .unwrap_or_else(|| PathBuf::from("/usr/local/bin/claude-monitor"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_under_roots() {
        let storage =
            StorageConfig::with_roots(PathBuf::from("/tmp/m"), PathBuf::from("/tmp/claude"));
        assert_eq!(storage.sessions_file(), PathBuf::from("/tmp/m/sessions.json"));
        assert_eq!(
            storage.sessions_lock_dir(),
            PathBuf::from("/tmp/m/sessions.lock")
        );
        assert_eq!(
            storage.claude_settings_file(),
            PathBuf::from("/tmp/claude/settings.json")
        );
    }
}
