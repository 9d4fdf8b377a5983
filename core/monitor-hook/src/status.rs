//! Operator commands: `status`, `reset`, `setup`.
//!
//! Unlike `handle` and `render`, these talk to a person at a terminal, so
//! they print to stdout and fail loudly.

use chrono::{Local, TimeZone, Utc};
use monitor_core::{
    describe, run_setup, verify_hook_program, MergeStrategy, MonitorConfig, SessionStore,
    SessionSummary, StatusRenderer, StorageConfig,
};

pub fn status(json: bool) -> Result<(), String> {
    let storage = StorageConfig::from_env()?;
    let config = MonitorConfig::load(&storage);
    let store = SessionStore::open(&storage, &config);
    let now = Utc::now().timestamp();

    let document = store.read_all()?;
    let sessions = describe(&document, now, &config);

    if json {
        let content = serde_json::to_string_pretty(&sessions)
            .map_err(|e| format!("Failed to serialize status: {}", e))?;
        println!("{content}");
        return Ok(());
    }

    let rendered = StatusRenderer::new(store, config).render_at(now);
    println!("{}", rendered.text);
    println!("store: {}", storage.sessions_file().display());

    if sessions.is_empty() {
        println!("no sessions");
        return Ok(());
    }
    for session in &sessions {
        println!("{}", format_session(session, now));
    }
    Ok(())
}

pub fn reset() -> Result<(), String> {
    let storage = StorageConfig::from_env()?;
    let config = MonitorConfig::load(&storage);
    SessionStore::open(&storage, &config).reset()?;
    println!("Cleared {}", storage.sessions_file().display());
    Ok(())
}

pub fn setup(strategy: MergeStrategy) -> Result<(), String> {
    let storage = StorageConfig::from_env()?;
    let mut config = MonitorConfig::load(&storage);
    if config.hook_program.is_none() && strategy != MergeStrategy::Skip {
        let default_program = storage.default_hook_program();
        if let Err(err) = verify_hook_program(&default_program) {
            let exe = std::env::current_exe()
                .map_err(|e| format!("{err}; current executable unknown: {e}"))?;
            tracing::info!(
                default = %default_program.display(),
                fallback = %exe.display(),
                "Default hook program unusable, registering running executable"
            );
            println!("{err}; registering {} instead", exe.display());
            config.hook_program = Some(exe);
        }
    }
    let report = run_setup(&storage, &config, strategy)?;

    if let Some(backup) = &report.backup_path {
        println!("Backed up settings to {}", backup.display());
    }
    if !report.written {
        println!(
            "Left {} unchanged (strategy: {})",
            report.settings_path.display(),
            report.strategy
        );
        return Ok(());
    }

    println!("Updated {}", report.settings_path.display());
    let added: Vec<_> = report.added().collect();
    if !added.is_empty() {
        println!("  added:     {}", added.join(", "));
    }
    let refreshed: Vec<_> = report.refreshed().collect();
    if !refreshed.is_empty() {
        println!("  refreshed: {}", refreshed.join(", "));
    }
    Ok(())
}

fn format_session(session: &SessionSummary, now: i64) -> String {
    let marker = if session.active { "*" } else { " " };
    let seen = Local
        .timestamp_opt(now - session.idle_secs, 0)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{marker} {:<14} {:>6} ago ({seen})  {}  {}",
        session.state.as_str(),
        format_age(session.idle_secs),
        session.id,
        session.working_directory,
    )
}

fn format_age(secs: i64) -> String {
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}
