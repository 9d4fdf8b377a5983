//! Session state tracking.
//!
//! ```text
//! Claude Code → claude-monitor handle → sessions.json → claude-monitor render → menu bar
//!   (events)        (many writers)        (storage)         (one reader)       (display)
//! ```
//!
//! # Module Structure
//!
//! - [`lock`]: Lock directory serializing writers
//! - [`store`]: Reads/writes the JSON store (`~/.claude-monitor/sessions.json`)
//! - [`transition`]: Event → state table
//! - [`types`]: Hook payloads, events and the on-disk document

pub mod lock;
mod store;
pub mod transition;
mod types;


pub use lock::StoreLock;
pub use store::SessionStore;
pub use types::{EventKind, HookEvent, HookInput, SessionStoreDocument, STORE_VERSION};
