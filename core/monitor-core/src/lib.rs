//! # monitor-core
//!
//! Core library for claude-monitor: tracks the live state of concurrent Claude
//! Code sessions and reduces them to one status line for a menu-bar host.
//!
//! ## Design Principles
//!
//! - **No daemon**: every hook invocation and every render is its own short
//!   process. All shared state lives in one JSON document guarded by a lock
//!   directory.
//! - **Synchronous**: no async runtime. Hooks must finish in milliseconds.
//! - **Graceful degradation**: a broken store, config or lock never fails the
//!   assistant's hook. The worst case is a lagging or "unavailable" display.
//! - **Sidecar**: setup only ever touches our own entries in settings.json.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use monitor_core::{HookReceiver, MonitorConfig, SessionStore, StatusRenderer, StorageConfig};
//!
//! let storage = StorageConfig::from_env()?;
//! let config = MonitorConfig::load(&storage);
//!
//! HookReceiver::open(&storage, &config).receive(payload, None)?;
//!
//! let line = StatusRenderer::new(SessionStore::open(&storage, &config), config).render();
//! println!("{}", line.text);
//! ```

pub mod config;
pub mod error;
pub mod receiver;
pub mod render;
pub mod setup;
pub mod state;
pub mod storage;
pub mod types;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use receiver::HookReceiver;
pub use render::{describe, summarize, Rendered, SessionSummary, StatusRenderer};
pub use setup::{
    run_setup, verify_hook_program, MergeStrategy, SettingsDocument, SettingsMerger, SetupReport,
};
pub use state::{EventKind, HookEvent, HookInput, SessionStore, SessionStoreDocument};
pub use storage::StorageConfig;
pub use types::{Session, SessionState};
