//! Error types for monitor-core operations.

use std::path::PathBuf;

/// All errors that can occur in monitor-core operations.
///
/// Only [`MonitorError::LockTimeout`] is worth retrying. Everything else is
/// either a local rejection of bad input or a failure the caller reports and
/// moves past.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    // ─────────────────────────────────────────────────────────────────────
    // Hook Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid hook event: {0}")]
    InvalidEvent(String),

    #[error("Unknown hook event: {0}")]
    UnknownEvent(String),

    // ─────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session store corrupt: {path}: {details}")]
    StoreCorrupt { path: PathBuf, details: String },

    #[error("Timed out after {waited_ms}ms waiting for store lock {path}")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid settings document: {0}")]
    InvalidConfig(String),

    #[error("Hook program {path} is not usable: {reason}")]
    HookProgramUnavailable { path: PathBuf, reason: String },

    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MonitorError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| MonitorError::Io { context, source }
    }

    pub(crate) fn json(context: impl Into<String>) -> impl FnOnce(serde_json::Error) -> Self {
        let context = context.into();
        move |source| MonitorError::Json { context, source }
    }

    /// Whether retrying the same operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MonitorError::LockTimeout { .. })
    }
}

/// Convenience type alias for Results using MonitorError.
pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<MonitorError> for String {
    fn from(err: MonitorError) -> String {
        err.to_string()
    }
}
