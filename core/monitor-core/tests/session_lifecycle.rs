//! End-to-end coverage through the public API: setup, hooks, render.

use monitor_core::render::{EXIT_ATTENTION, EXIT_NORMAL, QUIESCENT_TEXT};
use monitor_core::{
    run_setup, HookReceiver, MergeStrategy, MonitorConfig, MonitorError, SessionState,
    SessionStore, StatusRenderer, StorageConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn install_program(temp: &TempDir) -> PathBuf {
    let program = temp.path().join("bin").join("claude-monitor");
    std::fs::create_dir_all(program.parent().unwrap()).unwrap();
    std::fs::write(&program, "#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    program
}

fn setup_test_env() -> (TempDir, StorageConfig, MonitorConfig) {
    let temp = TempDir::new().unwrap();
    let storage = StorageConfig::with_roots(
        temp.path().join(".claude-monitor"),
        temp.path().join(".claude"),
    );
    let config = MonitorConfig {
        hook_program: Some(install_program(&temp)),
        ..MonitorConfig::default()
    };
    (temp, storage, config)
}

fn payload(session_id: &str, event: &str) -> String {
    format!(
        r#"{{"session_id": "{session_id}", "hook_event_name": "{event}", "cwd": "/work/{session_id}"}}"#
    )
}

fn renderer(storage: &StorageConfig, config: &MonitorConfig) -> StatusRenderer {
    StatusRenderer::new(SessionStore::open(storage, config), config.clone())
}

#[test]
fn test_setup_then_hooks_then_render() {
    let (_temp, storage, config) = setup_test_env();

    let report = run_setup(&storage, &config, MergeStrategy::MergeReplace).unwrap();
    assert!(report.written);
    assert_eq!(renderer(&storage, &config).render_at(0).text, QUIESCENT_TEXT);

    let settings = std::fs::read_to_string(storage.claude_settings_file()).unwrap();
    let program = config.hook_program(&storage);
    assert!(settings.contains(&format!("{} handle", program.display())));

    let receiver = HookReceiver::open(&storage, &config);
    receiver
        .receive_at(&payload("a", "SessionStart"), None, 100)
        .unwrap();
    receiver
        .receive_at(&payload("a", "UserPromptSubmit"), None, 101)
        .unwrap();

    let rendered = renderer(&storage, &config).render_at(102);
    assert_eq!(rendered.text, "🟢 thinking (1)");
    assert_eq!(rendered.exit_status, EXIT_NORMAL);

    receiver
        .receive_at(&payload("b", "SessionStart"), Some("error"), 103)
        .unwrap();
    let rendered = renderer(&storage, &config).render_at(104);
    assert_eq!(rendered.text, "🔴 error (2)");
    assert_eq!(rendered.exit_status, EXIT_ATTENTION);
    assert_eq!(rendered.dominant, Some(SessionState::Error));
}

#[test]
fn test_rejected_events_leave_store_untouched() {
    let (_temp, storage, config) = setup_test_env();
    let receiver = HookReceiver::open(&storage, &config);

    receiver
        .receive_at(&payload("a", "Stop"), None, 10)
        .unwrap();
    let before = std::fs::read_to_string(storage.sessions_file()).unwrap();

    let err = receiver
        .receive_at(&payload("a", "Teleport"), None, 11)
        .unwrap_err();
    assert!(matches!(err, MonitorError::UnknownEvent(_)));

    let err = receiver.receive_at("not json", None, 12).unwrap_err();
    assert!(matches!(err, MonitorError::InvalidEvent(_)));

    let after = std::fs::read_to_string(storage.sessions_file()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_concurrent_hooks_from_many_sessions() {
    let (_temp, storage, config) = setup_test_env();
    let storage = Arc::new(storage);
    let config = Arc::new(config);

    let handles: Vec<_> = (0..6)
        .map(|n| {
            let storage = Arc::clone(&storage);
            let config = Arc::clone(&config);
            thread::spawn(move || {
                let receiver = HookReceiver::open(&storage, &config);
                let id = format!("session-{n}");
                for (i, event) in ["SessionStart", "UserPromptSubmit", "PreToolUse", "Stop"]
                    .iter()
                    .enumerate()
                {
                    receiver
                        .receive_at(&payload(&id, event), None, 1000 + i as i64)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let document = SessionStore::open(&storage, &config).read_all().unwrap();
    assert_eq!(document.len(), 6);
    for session in document.all_sessions() {
        assert_eq!(session.state, SessionState::Idle);
        assert_eq!(session.last_activity_at, 1003);
        assert_eq!(session.working_directory, format!("/work/{}", session.id));
    }

    let rendered = renderer(&storage, &config).render_at(1004);
    assert_eq!(rendered.text, "⚪ idle (6)");
}

#[test]
fn test_corrupt_store_recovers_on_next_hook() {
    let (_temp, storage, config) = setup_test_env();
    std::fs::create_dir_all(storage.root()).unwrap();
    std::fs::write(storage.sessions_file(), "{\"sessions\": [").unwrap();

    let session = HookReceiver::open(&storage, &config)
        .receive_at(&payload("a", "Notification"), None, 5)
        .unwrap()
        .unwrap();
    assert_eq!(session.state, SessionState::WaitingInput);

    let document = SessionStore::open(&storage, &config).read_all().unwrap();
    assert_eq!(document.len(), 1);
    assert!(storage
        .sessions_file()
        .with_file_name("sessions.json.corrupt")
        .exists());
}

#[test]
fn test_reset_clears_display() {
    let (_temp, storage, config) = setup_test_env();
    HookReceiver::open(&storage, &config)
        .receive_at(&payload("a", "UserPromptSubmit"), None, 5)
        .unwrap();

    SessionStore::open(&storage, &config).reset().unwrap();
    assert_eq!(renderer(&storage, &config).render_at(6).text, QUIESCENT_TEXT);
}
