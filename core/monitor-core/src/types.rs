//! Core types shared by the hook, the renderer and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// Session State Types
// ═══════════════════════════════════════════════════════════════════════════════

/// The current state of an assistant session.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Thinking,
    WaitingInput,
    Idle,
    Error,
    Done,
}

impl SessionState {
    pub const ALL: [SessionState; 6] = [
        SessionState::Starting,
        SessionState::Thinking,
        SessionState::WaitingInput,
        SessionState::Idle,
        SessionState::Error,
        SessionState::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Starting => "starting",
            SessionState::Thinking => "thinking",
            SessionState::WaitingInput => "waiting_input",
            SessionState::Idle => "idle",
            SessionState::Error => "error",
            SessionState::Done => "done",
        }
    }

    /// Finished sessions are never shown, regardless of age.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════════════

/// One tracked assistant session.
///
/// The id is the key in the store document, so it is not serialized inside the
/// record; the store fills it back in on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(skip)]
    pub id: String,
    pub state: SessionState,
    #[serde(default)]
    pub working_directory: String,
    /// Unix seconds.
    pub started_at: i64,
    /// Unix seconds. Never earlier than `started_at`.
    pub last_activity_at: i64,
    #[serde(default)]
    pub last_event: String,
}

impl Session {
    /// Seconds since the last event, clamped at zero for clock skew.
    pub fn idle_secs(&self, now: i64) -> i64 {
        now.saturating_sub(self.last_activity_at).max(0)
    }

    /// A session is stale once it has been quiet for at least `stale_after_secs`.
    pub fn is_stale(&self, now: i64, stale_after_secs: i64) -> bool {
        self.idle_secs(now) >= stale_after_secs
    }

    /// Visible in the aggregated status: not finished and not stale.
    pub fn is_active(&self, now: i64, stale_after_secs: i64) -> bool {
        !self.state.is_finished() && !self.is_stale(now, stale_after_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(state: SessionState, last_activity_at: i64) -> Session {
        Session {
            id: "s".to_string(),
            state,
            working_directory: "/project".to_string(),
            started_at: last_activity_at,
            last_activity_at,
            last_event: "user_prompt_submit".to_string(),
        }
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::WaitingInput).unwrap();
        assert_eq!(json, "\"waiting_input\"");
        for state in SessionState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn test_stale_boundary() {
        let session = make_session(SessionState::Thinking, 1_000);
        assert!(!session.is_stale(1_000 + 1799, 1800));
        assert!(session.is_stale(1_000 + 1800, 1800));
    }

    #[test]
    fn test_done_is_never_active() {
        let session = make_session(SessionState::Done, 1_000);
        assert!(!session.is_active(1_000, 1800));
    }

    #[test]
    fn test_future_activity_counts_as_fresh() {
        let session = make_session(SessionState::Idle, 2_000);
        assert_eq!(session.idle_secs(1_000), 0);
        assert!(session.is_active(1_000, 1800));
    }
}
