//! File logging for the CLI.
//!
//! stdout belongs to the menu-bar host (render) and stdin to Claude Code
//! (handle), so all tracing output goes to `<root>/debug.log`.
//!
//! `CLAUDE_MONITOR_DEBUG=1` turns on debug logging; otherwise `RUST_LOG`
//! applies, defaulting to warnings only.

use fs_err as fs;
use monitor_core::StorageConfig;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "CLAUDE_MONITOR_DEBUG";
const DEFAULT_FILTER: &str = "warn";

/// Installs the file subscriber. Returns `None` (logging disabled) if the log
/// directory can't be created; a hook must never fail over its own logs.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    if let Err(err) = fs::create_dir_all(storage.root()) {
        eprintln!("claude-monitor: logging disabled: {err}");
        return None;
    }

    let file_appender = tracing_appender::rolling::never(storage.root(), storage.log_file_name());
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let result = tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false),
        )
        .try_init();

    match result {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}
