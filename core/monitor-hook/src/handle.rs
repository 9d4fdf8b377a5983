//! Event handler for Claude Code hooks.
//!
//! Reads the hook payload from stdin and records it in the session store.
//! The event name comes from the payload's `hook_event_name`, or from the
//! command line (`claude-monitor handle stop`) when given.
//!
//! ## State Machine
//!
//! ```text
//! SessionStart                    → starting
//! UserPromptSubmit                → thinking
//! PreToolUse / PostToolUse        → thinking
//! Notification                    → waiting_input
//! Stop / PostResponse             → idle
//! Error                           → error
//! SessionEnd                      → done
//! ```
//!
//! Claude Code shows hook failures to the user, so every outcome here is
//! reported as success; problems go to the debug log.

use monitor_core::{HookReceiver, MonitorConfig, MonitorError, StorageConfig};
use std::io::{self, Read};

pub fn run(event: Option<&str>) -> Result<(), String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| format!("Failed to read stdin: {}", e))?;

    let storage = StorageConfig::from_env()?;
    let config = MonitorConfig::load(&storage);
    handle_payload(&HookReceiver::open(&storage, &config), &input, event)
}

fn handle_payload(
    receiver: &HookReceiver,
    payload: &str,
    event: Option<&str>,
) -> Result<(), String> {
    match receiver.receive(payload, event) {
        Ok(Some(session)) => {
            tracing::debug!(
                session = %session.id,
                state = %session.state,
                "Session updated"
            );
            Ok(())
        }
        Ok(None) => Ok(()),
        // Rejections are about the payload, not about us.
        Err(err @ (MonitorError::InvalidEvent(_) | MonitorError::UnknownEvent(_))) => {
            tracing::info!(error = %err, "Ignoring hook event");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::{SessionState, SessionStore};
    use tempfile::TempDir;

    fn setup() -> (TempDir, StorageConfig, HookReceiver) {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_roots(
            temp.path().join(".claude-monitor"),
            temp.path().join(".claude"),
        );
        let receiver = HookReceiver::open(&storage, &MonitorConfig::default());
        (temp, storage, receiver)
    }

    fn stored_state(storage: &StorageConfig, id: &str) -> Option<SessionState> {
        SessionStore::open(storage, &MonitorConfig::default())
            .read_all()
            .unwrap()
            .get(id)
            .map(|s| s.state)
    }

    #[test]
    fn test_payload_updates_store() {
        let (_temp, storage, receiver) = setup();
        let payload = r#"{"session_id": "s1", "hook_event_name": "PreToolUse", "tool_name": "Bash"}"#;
        handle_payload(&receiver, payload, None).unwrap();
        assert_eq!(stored_state(&storage, "s1"), Some(SessionState::Thinking));
    }

    #[test]
    fn test_event_argument_wins() {
        let (_temp, storage, receiver) = setup();
        let payload = r#"{"session_id": "s1", "hook_event_name": "Stop"}"#;
        handle_payload(&receiver, payload, Some("notification")).unwrap();
        assert_eq!(
            stored_state(&storage, "s1"),
            Some(SessionState::WaitingInput)
        );
    }

    #[test]
    fn test_bad_payloads_are_not_failures() {
        let (_temp, storage, receiver) = setup();
        assert!(handle_payload(&receiver, "{not json", None).is_ok());
        assert!(handle_payload(&receiver, r#"{"hook_event_name": "Stop"}"#, None).is_ok());
        assert!(handle_payload(
            &receiver,
            r#"{"session_id": "s1", "hook_event_name": "SubagentStop"}"#,
            None
        )
        .is_ok());
        assert!(handle_payload(&receiver, "", None).is_ok());
        assert!(!storage.sessions_file().exists());
    }
}
