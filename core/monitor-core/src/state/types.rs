//! Serialized state types used by the hook/store pipeline.
//!
//! Current on-disk format is v1:
//!
//! ```json
//! {
//!   "version": 1,
//!   "sessions": {
//!     "session-abc": {
//!       "state": "thinking",
//!       "working_directory": "/project",
//!       "started_at": 1760000000,
//!       "last_activity_at": 1760000042,
//!       "last_event": "user_prompt_submit"
//!     }
//!   }
//! }
//! ```
//!
//! The unversioned flat map (`{ "<id>": {...} }`, including the bare `{}` older
//! installs seed) is still read and is upgraded on the next write.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MonitorError, Result};
use crate::types::Session;

pub const STORE_VERSION: u32 = 1;

// -----------------------------------------------------------------------------
// Hook events
// -----------------------------------------------------------------------------

/// Lifecycle events this system knows how to apply.
///
/// Both the snake_case names and Claude Code's `hook_event_name` spellings are
/// accepted; [`EventKind::as_str`] gives the canonical name stored in
/// `last_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    AssistantWorking,
    Notification,
    Stop,
    PostResponse,
    Error,
    SessionEnd,
}

impl EventKind {
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name.trim() {
            "session_start" | "SessionStart" => EventKind::SessionStart,
            "user_prompt_submit" | "UserPromptSubmit" => EventKind::UserPromptSubmit,
            "pre_tool_use" | "PreToolUse" => EventKind::PreToolUse,
            "assistant_working" | "post_tool_use" | "PostToolUse" => EventKind::AssistantWorking,
            "notification" | "Notification" => EventKind::Notification,
            "stop" | "Stop" => EventKind::Stop,
            "post_response" | "PostResponse" => EventKind::PostResponse,
            "error" | "Error" => EventKind::Error,
            "session_end" | "SessionEnd" => EventKind::SessionEnd,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionStart => "session_start",
            EventKind::UserPromptSubmit => "user_prompt_submit",
            EventKind::PreToolUse => "pre_tool_use",
            EventKind::AssistantWorking => "assistant_working",
            EventKind::Notification => "notification",
            EventKind::Stop => "stop",
            EventKind::PostResponse => "post_response",
            EventKind::Error => "error",
            EventKind::SessionEnd => "session_end",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw hook payload as Claude Code writes it to stdin.
///
/// Everything is optional here; [`HookInput::into_event`] decides what is
/// required. Unrelated payload fields (transcript_path, tool_name, ...) are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, alias = "event_name", alias = "event")]
    pub hook_event_name: Option<String>,
    #[serde(default, alias = "working_directory")]
    pub cwd: Option<String>,
}

impl HookInput {
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| MonitorError::InvalidEvent(format!("payload is not a JSON object: {e}")))
    }

    /// Validates the payload into a [`HookEvent`].
    ///
    /// `event_override` (the event named on the hook's command line) wins over
    /// the payload's own event name.
    pub fn into_event(self, event_override: Option<&str>, timestamp: i64) -> Result<HookEvent> {
        let session_id = non_empty(self.session_id)
            .ok_or_else(|| MonitorError::InvalidEvent("missing session_id".to_string()))?;
        let event_name = non_empty(event_override.map(str::to_string))
            .or_else(|| non_empty(self.hook_event_name))
            .ok_or_else(|| MonitorError::InvalidEvent("missing event name".to_string()))?;

        Ok(HookEvent {
            session_id,
            event_name,
            working_directory: non_empty(self.cwd),
            timestamp,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A validated lifecycle notification, consumed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEvent {
    pub session_id: String,
    pub event_name: String,
    pub working_directory: Option<String>,
    /// Unix seconds.
    pub timestamp: i64,
}

impl HookEvent {
    pub fn new(session_id: impl Into<String>, event_name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            session_id: session_id.into(),
            event_name: event_name.into(),
            working_directory: None,
            timestamp,
        }
    }

    pub fn with_working_directory(mut self, cwd: impl Into<String>) -> Self {
        self.working_directory = Some(cwd.into());
        self
    }

    pub fn kind(&self) -> Result<EventKind> {
        EventKind::parse(&self.event_name)
            .ok_or_else(|| MonitorError::UnknownEvent(self.event_name.clone()))
    }
}

// -----------------------------------------------------------------------------
// Store document
// -----------------------------------------------------------------------------

/// The durable aggregate: session id → session, plus a format version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStoreDocument {
    pub version: u32,
    pub sessions: BTreeMap<String, Session>,
}

impl Default for SessionStoreDocument {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            sessions: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OnDiskDocument {
    Versioned {
        version: u32,
        sessions: BTreeMap<String, Session>,
    },
    Legacy(BTreeMap<String, Session>),
}

impl SessionStoreDocument {
    /// Parses document text. An empty file is an empty document.
    ///
    /// Returns the parse failure as a string so the store can attach its path.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let on_disk: OnDiskDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let mut sessions = match on_disk {
            OnDiskDocument::Versioned { version, sessions } if version == STORE_VERSION => sessions,
            OnDiskDocument::Versioned { version, .. } => {
                return Err(format!(
                    "unsupported store version {version} (expected {STORE_VERSION})"
                ))
            }
            OnDiskDocument::Legacy(sessions) => sessions,
        };

        for (id, session) in sessions.iter_mut() {
            session.id.clone_from(id);
        }

        Ok(Self {
            version: STORE_VERSION,
            sessions,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(MonitorError::json("serialize session store"))
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn all_sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Applies a hook event, creating the session on first sight.
    pub fn apply(&mut self, event: &HookEvent, kind: EventKind) -> Session {
        let next = super::transition::apply(self.sessions.get(&event.session_id), event, kind);
        self.sessions.insert(next.id.clone(), next.clone());
        next
    }

    /// Drops finished sessions and sessions quiet for `stale_after_secs`.
    /// Returns how many were removed.
    pub fn remove_inactive(&mut self, now: i64, stale_after_secs: i64) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.is_active(now, stale_after_secs));
        before - self.sessions.len()
    }
}
