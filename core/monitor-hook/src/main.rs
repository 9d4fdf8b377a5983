//! claude-monitor: hook handler and status line for Claude Code sessions.
//!
//! Claude Code runs `claude-monitor handle` for each lifecycle hook
//! configured in ~/.claude/settings.json; the menu-bar host runs
//! `claude-monitor render` once a second.
//!
//! ## Subcommands
//!
//! - `handle`: Record a hook event (reads JSON from stdin)
//! - `render`: Print the aggregated status line
//! - `status`: List tracked sessions
//! - `reset`: Clear all sessions
//! - `setup`: Install hooks into Claude Code's settings

mod handle;
mod logging;
mod status;

use clap::{Parser, Subcommand};
use monitor_core::render::{EXIT_NORMAL, UNAVAILABLE_TEXT};
use monitor_core::{MergeStrategy, MonitorConfig, SessionStore, StatusRenderer, StorageConfig};

#[derive(Parser)]
#[command(name = "claude-monitor")]
#[command(about = "Claude Code session status monitor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a hook event (reads JSON from stdin)
    Handle {
        /// Event name; overrides the payload's hook_event_name
        #[arg(value_name = "EVENT")]
        event: Option<String>,
    },

    /// Print the aggregated status line for the menu bar
    Render,

    /// List tracked sessions
    Status {
        /// Print sessions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear all tracked sessions
    Reset,

    /// Install hooks into Claude Code's settings.json
    Setup {
        /// generate, merge-replace or skip
        #[arg(long, default_value = "merge-replace")]
        strategy: MergeStrategy,
    },
}

fn main() {
    let cli = Cli::parse();
    let storage = StorageConfig::from_env();
    let _logging_guard = storage.as_ref().ok().and_then(logging::init);

    match cli.command {
        Commands::Handle { event } => {
            // Never fail the assistant's hook - log and exit 0.
            if let Err(e) = handle::run(event.as_deref()) {
                tracing::error!(error = %e, "claude-monitor handle failed");
            }
        }
        Commands::Render => std::process::exit(render(storage.ok())),
        Commands::Status { json } => exit_on_error("status", status::status(json)),
        Commands::Reset => exit_on_error("reset", status::reset()),
        Commands::Setup { strategy } => exit_on_error("setup", status::setup(strategy)),
    }
}

fn render(storage: Option<StorageConfig>) -> i32 {
    let Some(storage) = storage else {
        println!("{UNAVAILABLE_TEXT}");
        return EXIT_NORMAL;
    };
    let config = MonitorConfig::load(&storage);
    let rendered = StatusRenderer::new(SessionStore::open(&storage, &config), config).render();
    println!("{}", rendered.text);
    rendered.exit_status
}

fn exit_on_error(command: &str, result: Result<(), String>) {
    if let Err(e) = result {
        tracing::error!(error = %e, command, "claude-monitor command failed");
        eprintln!("claude-monitor {command}: {e}");
        std::process::exit(1);
    }
}
