//! Hook event receiver.
//!
//! One call per hook invocation: validate the payload, apply it to the store,
//! and get out of the way. Keeps no state of its own between calls.
//!
//! Rejections (`InvalidEvent`, `UnknownEvent`) come back as errors for the
//! caller to log. Lock timeouts are retried a few times and then dropped, so
//! the displayed state lags by one event instead of the hook hanging.

use chrono::Utc;

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::state::{HookEvent, HookInput, SessionStore};
use crate::storage::StorageConfig;
use crate::types::Session;

pub struct HookReceiver {
    store: SessionStore,
    lock_retries: u32,
}

impl HookReceiver {
    pub fn new(store: SessionStore, lock_retries: u32) -> Self {
        Self {
            store,
            lock_retries,
        }
    }

    pub fn open(storage: &StorageConfig, config: &MonitorConfig) -> Self {
        Self::new(SessionStore::open(storage, config), config.lock_retries)
    }

    /// Handles a raw payload stamped with the current time.
    ///
    /// Returns `Ok(None)` when there was nothing to do: an empty payload with
    /// no event named on the command line, or an event dropped after lock
    /// retries ran out.
    pub fn receive(&self, payload: &str, event_override: Option<&str>) -> Result<Option<Session>> {
        self.receive_at(payload, event_override, Utc::now().timestamp())
    }

    pub fn receive_at(
        &self,
        payload: &str,
        event_override: Option<&str>,
        timestamp: i64,
    ) -> Result<Option<Session>> {
        let input = if payload.trim().is_empty() {
            if event_override.is_none() {
                return Ok(None);
            }
            HookInput::default()
        } else {
            HookInput::parse(payload)?
        };

        let event = input.into_event(event_override, timestamp)?;
        self.deliver(&event)
    }

    /// Applies an already validated event, retrying lock timeouts.
    pub fn deliver(&self, event: &HookEvent) -> Result<Option<Session>> {
        let mut attempt = 0;
        loop {
            match self.store.apply_event(event) {
                Ok(session) => return Ok(Some(session)),
                Err(err) if err.is_retryable() && attempt < self.lock_retries => {
                    attempt += 1;
                    tracing::debug!(
                        session = %event.session_id,
                        attempt,
                        "Store lock busy, retrying"
                    );
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        session = %event.session_id,
                        event = %event.event_name,
                        error = %err,
                        "Dropping hook event after lock retries"
                    );
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use crate::state::StoreLock;
    use crate::types::SessionState;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn setup(lock_retries: u32) -> (TempDir, HookReceiver) {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(
            &temp.path().join("sessions.json"),
            &temp.path().join("sessions.lock"),
        )
        .with_lock_timeout(Duration::from_millis(20));
        (temp, HookReceiver::new(store, lock_retries))
    }

    #[test]
    fn test_claude_payload_is_applied() {
        let (_temp, receiver) = setup(0);
        let payload = r#"{
            "session_id": "abc",
            "hook_event_name": "UserPromptSubmit",
            "cwd": "/home/user/project",
            "prompt": "hello"
        }"#;

        let session = receiver.receive_at(payload, None, 42).unwrap().unwrap();
        assert_eq!(session.id, "abc");
        assert_eq!(session.state, SessionState::Thinking);
        assert_eq!(session.working_directory, "/home/user/project");
        assert_eq!(session.last_activity_at, 42);
    }

    #[test]
    fn test_command_line_event_overrides_payload() {
        let (_temp, receiver) = setup(0);
        let payload = r#"{"session_id": "abc", "hook_event_name": "Stop"}"#;
        let session = receiver
            .receive_at(payload, Some("error"), 1)
            .unwrap()
            .unwrap();
        assert_eq!(session.state, SessionState::Error);
    }

    #[test]
    fn test_empty_payload_is_noop() {
        let (temp, receiver) = setup(0);
        assert_eq!(receiver.receive_at("  \n", None, 1).unwrap(), None);
        assert!(!temp.path().join("sessions.json").exists());
    }

    #[test]
    fn test_empty_payload_with_event_is_invalid() {
        let (_temp, receiver) = setup(0);
        let err = receiver.receive_at("", Some("stop"), 1).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidEvent(_)));
    }

    #[test]
    fn test_missing_session_id_is_rejected_without_mutation() {
        let (temp, receiver) = setup(0);
        let err = receiver
            .receive_at(r#"{"hook_event_name": "Stop"}"#, None, 1)
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidEvent(_)));
        assert!(!temp.path().join("sessions.json").exists());
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let (_temp, receiver) = setup(0);
        let err = receiver
            .receive_at(
                r#"{"session_id": "abc", "hook_event_name": "SubagentStop"}"#,
                None,
                1,
            )
            .unwrap_err();
        assert!(matches!(err, MonitorError::UnknownEvent(_)));
    }

    #[test]
    fn test_lock_timeout_becomes_noop_after_retries() {
        let (temp, receiver) = setup(2);
        let _held = StoreLock::acquire(
            &temp.path().join("sessions.lock"),
            Duration::from_millis(100),
        )
        .unwrap();

        let result = receiver
            .receive_at(r#"{"session_id": "abc", "hook_event_name": "Stop"}"#, None, 1)
            .unwrap();
        assert_eq!(result, None);
        assert!(!temp.path().join("sessions.json").exists());
    }
}
