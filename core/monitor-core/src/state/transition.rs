//! Maps hook events to session state transitions.
//!
//! The resulting state depends only on the event, never on the prior state,
//! so a replayed or reordered event can't wedge a session in a stale state.
//!
//! ```text
//! session_start                        → starting
//! user_prompt_submit                   → thinking
//! pre_tool_use / assistant_working     → thinking
//! notification                         → waiting_input
//! stop / post_response                 → idle
//! error                                → error
//! session_end                          → done
//! ```

use super::types::{EventKind, HookEvent};
use crate::types::{Session, SessionState};

pub fn next_state(event: EventKind) -> SessionState {
    match event {
        EventKind::SessionStart => SessionState::Starting,
        EventKind::UserPromptSubmit => SessionState::Thinking,
        EventKind::PreToolUse | EventKind::AssistantWorking => SessionState::Thinking,
        EventKind::Notification => SessionState::WaitingInput,
        EventKind::Stop | EventKind::PostResponse => SessionState::Idle,
        EventKind::Error => SessionState::Error,
        EventKind::SessionEnd => SessionState::Done,
    }
}

/// Computes the session that results from applying `event` to `existing`.
///
/// Self-transitions still refresh `last_activity_at` and `last_event`.
/// Activity time never moves backwards, even if events arrive out of order.
pub fn apply(existing: Option<&Session>, event: &HookEvent, kind: EventKind) -> Session {
    let working_directory = event
        .working_directory
        .clone()
        .or_else(|| existing.map(|s| s.working_directory.clone()))
        .unwrap_or_default();

    let (started_at, last_activity_at) = match existing {
        Some(prev) => (
            prev.started_at,
            event.timestamp.max(prev.last_activity_at),
        ),
        None => (event.timestamp, event.timestamp),
    };

    Session {
        id: event.session_id.clone(),
        state: next_state(kind),
        working_directory,
        started_at,
        last_activity_at,
        last_event: kind.as_str().to_string(),
    }
}
