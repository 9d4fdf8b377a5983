//! Aggregated status line for the menu-bar host.
//!
//! The host runs `claude-monitor render` once a second and shows whatever it
//! prints. Rendering reads the store, keeps sessions that are neither finished
//! nor stale, and reports the most attention-worthy state plus a count.
//!
//! The exit status tells the host whether anything needs attention:
//! [`EXIT_ATTENTION`] when an active session is in `error`, otherwise
//! [`EXIT_NORMAL`]. A store that can't be read renders as
//! [`UNAVAILABLE_TEXT`] with [`EXIT_NORMAL`]; a stale menu bar is better than
//! a broken one.

use chrono::Utc;
use serde::Serialize;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::state::{SessionStore, SessionStoreDocument};
use crate::types::SessionState;

pub const EXIT_NORMAL: i32 = 0;
pub const EXIT_ATTENTION: i32 = 1;

pub const QUIESCENT_TEXT: &str = "💤";
pub const UNAVAILABLE_TEXT: &str = "⚠️ status unavailable";

pub fn state_glyph(state: SessionState) -> &'static str {
    match state {
        SessionState::Error => "🔴",
        SessionState::WaitingInput => "🟡",
        SessionState::Thinking => "🟢",
        SessionState::Starting => "🔵",
        SessionState::Idle => "⚪",
        SessionState::Done => "⚫",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub exit_status: i32,
    pub active: usize,
    pub dominant: Option<SessionState>,
}

impl Rendered {
    fn quiescent() -> Self {
        Self {
            text: QUIESCENT_TEXT.to_string(),
            exit_status: EXIT_NORMAL,
            active: 0,
            dominant: None,
        }
    }

    fn unavailable() -> Self {
        Self {
            text: UNAVAILABLE_TEXT.to_string(),
            exit_status: EXIT_NORMAL,
            active: 0,
            dominant: None,
        }
    }
}

/// Per-session line for the operator `status` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub state: SessionState,
    pub working_directory: String,
    pub idle_secs: i64,
    pub active: bool,
}

/// Pure aggregation over a document at a given time.
pub fn summarize(document: &SessionStoreDocument, now: i64, config: &MonitorConfig) -> Rendered {
    let active: Vec<SessionState> = document
        .all_sessions()
        .filter(|s| s.is_active(now, config.stale_after_secs))
        .map(|s| s.state)
        .collect();

    let Some(dominant) = active
        .iter()
        .copied()
        .min_by_key(|state| config.priority_rank(*state))
    else {
        return Rendered::quiescent();
    };

    let exit_status = if active.contains(&SessionState::Error) {
        EXIT_ATTENTION
    } else {
        EXIT_NORMAL
    };

    Rendered {
        text: format!("{} {} ({})", state_glyph(dominant), dominant, active.len()),
        exit_status,
        active: active.len(),
        dominant: Some(dominant),
    }
}

/// All sessions in the document, active ones first in display priority,
/// then most recently active first.
pub fn describe(
    document: &SessionStoreDocument,
    now: i64,
    config: &MonitorConfig,
) -> Vec<SessionSummary> {
    let mut summaries: Vec<SessionSummary> = document
        .all_sessions()
        .map(|s| SessionSummary {
            id: s.id.clone(),
            state: s.state,
            working_directory: s.working_directory.clone(),
            idle_secs: s.idle_secs(now),
            active: s.is_active(now, config.stale_after_secs),
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.active
            .cmp(&a.active)
            .then_with(|| config.priority_rank(a.state).cmp(&config.priority_rank(b.state)))
            .then_with(|| a.idle_secs.cmp(&b.idle_secs))
            .then_with(|| a.id.cmp(&b.id))
    });
    summaries
}

pub struct StatusRenderer {
    store: SessionStore,
    config: MonitorConfig,
}

impl StatusRenderer {
    pub fn new(store: SessionStore, config: MonitorConfig) -> Self {
        Self { store, config }
    }

    pub fn render(&self) -> Rendered {
        self.render_at(Utc::now().timestamp())
    }

    /// Renders the status line. Never fails; see the module docs.
    pub fn render_at(&self, now: i64) -> Rendered {
        let document = match self.store.read_all() {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(error = %err, "Session store unavailable for render");
                return Rendered::unavailable();
            }
        };

        let rendered = summarize(&document, now, &self.config);

        if self.config.gc_stale_sessions && document.len() > rendered.active {
            self.collect_garbage(now);
        }

        rendered
    }

    fn collect_garbage(&self, now: i64) {
        match self
            .store
            .collect_garbage(now, self.config.stale_after_secs)
        {
            Ok(removed) if removed > 0 => {
                tracing::info!(removed, "Removed inactive sessions");
            }
            Ok(_) => {}
            Err(err @ MonitorError::LockTimeout { .. }) => {
                tracing::debug!(error = %err, "Store busy, skipping session cleanup");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Session cleanup failed");
            }
        }
    }
}
