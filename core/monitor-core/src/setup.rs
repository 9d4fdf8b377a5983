//! Hook installation into Claude Code's settings.json.
//!
//! The merger is a pure function over the settings document: it adds or
//! refreshes one entry per required trigger that runs `<hook program> handle`,
//! and leaves every other entry, key and value where it found it.
//! [`run_setup`] wraps it with the file handling: backup, atomic write, and
//! seeding the session store.
//!
//! ## Settings shape
//!
//! ```json
//! {
//!   "hooks": {
//!     "PreToolUse": [
//!       { "matcher": "*", "hooks": [{ "type": "command", "command": "~/.local/bin/claude-monitor handle" }] }
//!     ]
//!   }
//! }
//! ```
//!
//! An entry belongs to us when one of its inner commands runs the hook program
//! (the command's program path, compared as an exact string, shell-quoted or
//! not). Matching on anything looser would start eating other tools' hooks.

use chrono::Local;
use fs_err as fs;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::state::SessionStore;
use crate::storage::StorageConfig;

/// Triggers we register, with whether the entry needs `matcher: "*"` to fire
/// for every tool.
pub const HOOK_TRIGGERS: [(&str, bool); 6] = [
    ("SessionStart", false),
    ("UserPromptSubmit", false),
    ("PreToolUse", true),
    ("Notification", false),
    ("Stop", false),
    ("SessionEnd", false),
];

const HOOKS_KEY: &str = "hooks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Fresh document containing only our hooks.
    Generate,
    /// Replace our entries in place, keep everything else.
    MergeReplace,
    /// Leave the document alone.
    Skip,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Generate => "generate",
            MergeStrategy::MergeReplace => "merge-replace",
            MergeStrategy::Skip => "skip",
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "generate" => Ok(MergeStrategy::Generate),
            "merge-replace" | "merge" | "replace" => Ok(MergeStrategy::MergeReplace),
            "skip" => Ok(MergeStrategy::Skip),
            other => Err(MonitorError::InvalidConfig(format!(
                "unknown merge strategy '{other}' (expected generate, merge-replace or skip)"
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Settings Document
// ═══════════════════════════════════════════════════════════════════════════════

/// Claude Code's settings.json. Opaque apart from the `hooks` section; key
/// order is preserved on round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument(Value);

impl Default for SettingsDocument {
    fn default() -> Self {
        SettingsDocument(Value::Object(Map::new()))
    }
}

impl SettingsDocument {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).map(SettingsDocument).map_err(|e| {
            MonitorError::InvalidConfig(format!("settings.json is not valid JSON: {e}"))
        })
    }

    pub fn from_value(value: Value) -> Self {
        SettingsDocument(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.0).map_err(MonitorError::json("serialize settings"))
    }

    /// Adds an empty `hooks` object when the key is absent. Other shapes are
    /// left for [`SettingsMerger::merge`] to reject.
    pub fn ensure_hooks_section(&mut self) {
        if let Value::Object(map) = &mut self.0 {
            if !map.contains_key(HOOKS_KEY) {
                map.insert(HOOKS_KEY.to_string(), Value::Object(Map::new()));
            }
        }
    }

    /// Entries registered for `trigger`, or none.
    pub fn trigger_entries(&self, trigger: &str) -> &[Value] {
        self.0
            .get(HOOKS_KEY)
            .and_then(|hooks| hooks.get(trigger))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn hooks_mut(&mut self) -> Result<&mut Map<String, Value>> {
        let root = self.0.as_object_mut().ok_or_else(|| {
            MonitorError::InvalidConfig("settings root is not an object".into())
        })?;
        match root.get_mut(HOOKS_KEY) {
            Some(Value::Object(hooks)) => Ok(hooks),
            Some(_) => Err(MonitorError::InvalidConfig("'hooks' is not an object".into())),
            None => Err(MonitorError::InvalidConfig("missing 'hooks' section".into())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Merger
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    /// No entry of ours existed for the trigger.
    Added,
    /// An entry of ours was replaced by the canonical one.
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerChange {
    pub trigger: &'static str,
    pub action: HookAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub document: SettingsDocument,
    pub changes: Vec<TriggerChange>,
}

pub struct SettingsMerger {
    hook_program: String,
    quoted_program: String,
    hook_command: String,
}

impl SettingsMerger {
    pub fn new(hook_program: &Path) -> Self {
        let hook_program = hook_program.to_string_lossy().into_owned();
        let quoted_program = shell_quote(&hook_program);
        let hook_command = format!("{quoted_program} handle");
        Self {
            hook_program,
            quoted_program,
            hook_command,
        }
    }

    /// Command registered for every trigger.
    pub fn hook_command(&self) -> &str {
        &self.hook_command
    }

    /// Whether `command` runs our hook program.
    pub fn references_hook(&self, command: &str) -> bool {
        let command = command.trim_start();
        [&self.quoted_program, &self.hook_program]
            .into_iter()
            .any(|program| match command.strip_prefix(program.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
                None => false,
            })
    }

    /// A document holding only our hooks.
    pub fn generate(&self) -> SettingsDocument {
        let hooks: Map<String, Value> = HOOK_TRIGGERS
            .iter()
            .map(|(trigger, needs_matcher)| {
                (
                    trigger.to_string(),
                    Value::Array(vec![self.canonical_entry(*needs_matcher)]),
                )
            })
            .collect();

        let mut root = Map::new();
        root.insert(HOOKS_KEY.to_string(), Value::Object(hooks));
        SettingsDocument(Value::Object(root))
    }

    /// Applies `strategy` to `existing`. Never touches the filesystem.
    pub fn merge(
        &self,
        existing: &SettingsDocument,
        strategy: MergeStrategy,
    ) -> Result<MergeOutcome> {
        match strategy {
            MergeStrategy::Skip => Ok(MergeOutcome {
                document: existing.clone(),
                changes: Vec::new(),
            }),
            MergeStrategy::Generate => Ok(MergeOutcome {
                document: self.generate(),
                changes: HOOK_TRIGGERS
                    .iter()
                    .map(|(trigger, _)| TriggerChange {
                        trigger: *trigger,
                        action: HookAction::Added,
                    })
                    .collect(),
            }),
            MergeStrategy::MergeReplace => self.merge_replace(existing),
        }
    }

    fn merge_replace(&self, existing: &SettingsDocument) -> Result<MergeOutcome> {
        let mut document = existing.clone();
        let hooks = document.hooks_mut()?;

        // Validate every trigger before changing any, so a failed merge leaves
        // nothing half-done.
        for (trigger, _) in HOOK_TRIGGERS {
            match hooks.get(trigger) {
                None | Some(Value::Array(_)) => {}
                Some(_) => {
                    return Err(MonitorError::InvalidConfig(format!(
                        "hooks.{trigger} is not an array"
                    )))
                }
            }
        }

        let mut changes = Vec::with_capacity(HOOK_TRIGGERS.len());
        for (trigger, needs_matcher) in HOOK_TRIGGERS {
            let entries = match hooks.get_mut(trigger) {
                Some(Value::Array(entries)) => std::mem::take(entries),
                _ => Vec::new(),
            };

            let (mut merged, position) = self.strip_own_entries(entries);
            let action = match position {
                Some(index) => {
                    merged.insert(index, self.canonical_entry(needs_matcher));
                    HookAction::Refreshed
                }
                None => {
                    merged.push(self.canonical_entry(needs_matcher));
                    HookAction::Added
                }
            };

            hooks.insert(trigger.to_string(), Value::Array(merged));
            changes.push(TriggerChange { trigger, action });
        }

        Ok(MergeOutcome { document, changes })
    }

    /// Removes our commands from `entries`. Returns the remaining entries and
    /// where the canonical entry belongs if any of ours were found.
    fn strip_own_entries(&self, entries: Vec<Value>) -> (Vec<Value>, Option<usize>) {
        let mut kept = Vec::with_capacity(entries.len() + 1);
        let mut position = None;

        for mut entry in entries {
            // (removed any of ours, anything left)
            let stripped = entry
                .get_mut(HOOKS_KEY)
                .and_then(Value::as_array_mut)
                .map(|inner| {
                    let before = inner.len();
                    inner.retain(|hook| {
                        !hook
                            .get("command")
                            .and_then(Value::as_str)
                            .is_some_and(|command| self.references_hook(command))
                    });
                    (inner.len() != before, !inner.is_empty())
                });

            match stripped {
                Some((true, false)) => {
                    position.get_or_insert(kept.len());
                }
                Some((true, true)) => {
                    // Mixed entry: keep the foreign commands, ours goes right after.
                    kept.push(entry);
                    position.get_or_insert(kept.len());
                }
                _ => kept.push(entry),
            }
        }

        (kept, position)
    }

    fn canonical_entry(&self, needs_matcher: bool) -> Value {
        let hooks = json!([{ "type": "command", "command": self.hook_command }]);
        if needs_matcher {
            json!({ "matcher": "*", "hooks": hooks })
        } else {
            json!({ "hooks": hooks })
        }
    }
}

/// Quotes `word` for `sh` unless it is made only of characters the shell
/// passes through untouched.
fn shell_quote(word: &str) -> String {
    let is_plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+,:@%=".contains(c));
    if is_plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Setup Flow
// ═══════════════════════════════════════════════════════════════════════════════

/// Checks that Claude Code will be able to run `path`.
///
/// Catches the usual install breakage: the program was never installed at
/// the configured path, a symlink whose target moved, a relative path, or a
/// file without the executable bit.
pub fn verify_hook_program(path: &Path) -> Result<()> {
    let unavailable = |reason: String| MonitorError::HookProgramUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_absolute() {
        return Err(unavailable("path is not absolute".to_string()));
    }

    if path.is_symlink() && !path.exists() {
        let reason = match fs::read_link(path) {
            Ok(target) => format!("symlink target {} no longer exists", target.display()),
            Err(err) => format!("cannot read symlink: {err}"),
        };
        return Err(unavailable(reason));
    }

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(unavailable("not found".to_string()))
        }
        Err(err) => return Err(unavailable(err.to_string())),
    };
    if !metadata.is_file() {
        return Err(unavailable("not a regular file".to_string()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(unavailable("not executable".to_string()));
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupReport {
    pub strategy: MergeStrategy,
    pub settings_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    /// False when the settings file was left as it was.
    pub written: bool,
    pub changes: Vec<TriggerChange>,
}

impl SetupReport {
    pub fn added(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.triggers_with(HookAction::Added)
    }

    pub fn refreshed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.triggers_with(HookAction::Refreshed)
    }

    fn triggers_with(&self, action: HookAction) -> impl Iterator<Item = &'static str> + '_ {
        self.changes
            .iter()
            .filter(move |c| c.action == action)
            .map(|c| c.trigger)
    }
}

/// Installs our hooks into settings.json.
///
/// The hook program must be runnable before anything is written; a hook that
/// points at nothing fails every Claude Code event. An existing settings file
/// is always backed up first (and the backup path recorded under the monitor
/// root), so a failed or unwanted merge can be undone by hand.
///
/// Missing settings are generated from scratch. Existing settings are only
/// ever merged into, also under [`MergeStrategy::Generate`].
pub fn run_setup(
    storage: &StorageConfig,
    config: &MonitorConfig,
    strategy: MergeStrategy,
) -> Result<SetupReport> {
    let settings_path = storage.claude_settings_file();
    let hook_program = config.hook_program(storage);
    if strategy != MergeStrategy::Skip {
        verify_hook_program(&hook_program)?;
    }
    let merger = SettingsMerger::new(&hook_program);

    let existing = match fs::read_to_string(&settings_path) {
        Ok(content) => Some(content),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => return Err(MonitorError::io("read settings")(err)),
    };

    let backup_path = match existing {
        Some(_) => Some(backup_settings(storage, &settings_path)?),
        None => None,
    };

    let mut report = SetupReport {
        strategy,
        settings_path: settings_path.clone(),
        backup_path,
        written: false,
        changes: Vec::new(),
    };

    let outcome = match (existing, strategy) {
        (_, MergeStrategy::Skip) => {
            tracing::info!("Hook setup skipped, settings left unchanged");
            return Ok(report);
        }
        (None, _) => merger.merge(&SettingsDocument::default(), MergeStrategy::Generate)?,
        (Some(content), _) => {
            if strategy == MergeStrategy::Generate {
                tracing::info!("Settings already exist, merging hooks instead of regenerating");
            }
            let mut document = SettingsDocument::parse(&content)?;
            document.ensure_hooks_section();
            merger.merge(&document, MergeStrategy::MergeReplace)?
        }
    };

    write_settings(&settings_path, &outcome.document)?;
    seed_store(storage, config)?;

    tracing::info!(
        path = %settings_path.display(),
        strategy = %strategy,
        "Installed hooks"
    );

    report.written = true;
    report.changes = outcome.changes;
    Ok(report)
}

fn backup_settings(storage: &StorageConfig, settings_path: &Path) -> Result<PathBuf> {
    let base_name = format!("settings.json.backup.{}", Local::now().format("%Y%m%d_%H%M%S"));
    let mut backup_path = settings_path.with_file_name(&base_name);
    // Never overwrite an earlier backup taken within the same second.
    let mut suffix = 1;
    while backup_path.exists() {
        backup_path = settings_path.with_file_name(format!("{base_name}.{suffix}"));
        suffix += 1;
    }

    fs::copy(settings_path, &backup_path).map_err(MonitorError::io("back up settings"))?;

    fs::create_dir_all(storage.root()).map_err(MonitorError::io("create monitor root"))?;
    fs::write(
        storage.backup_record_file(),
        format!("{}\n", backup_path.display()),
    )
    .map_err(MonitorError::io("record settings backup"))?;

    tracing::info!(backup = %backup_path.display(), "Backed up settings");
    Ok(backup_path)
}

fn write_settings(settings_path: &Path, document: &SettingsDocument) -> Result<()> {
    let content = document.to_json_pretty()?;

    let settings_dir = settings_path.parent().ok_or_else(|| MonitorError::Io {
        context: "settings path has no parent directory".to_string(),
        source: ErrorKind::InvalidInput.into(),
    })?;
    fs::create_dir_all(settings_dir).map_err(MonitorError::io("create settings directory"))?;

    let mut temp_settings = NamedTempFile::new_in(settings_dir)
        .map_err(MonitorError::io("create temp settings file"))?;
    temp_settings
        .write_all(content.as_bytes())
        .map_err(MonitorError::io("write settings"))?;
    temp_settings
        .flush()
        .map_err(MonitorError::io("flush settings"))?;
    temp_settings
        .persist(settings_path)
        .map_err(|e| MonitorError::io("persist settings")(e.error))?;

    Ok(())
}

/// Creates an empty store and a default config.json if they are missing.
fn seed_store(storage: &StorageConfig, config: &MonitorConfig) -> Result<()> {
    if !storage.config_file().exists() {
        config.save(storage)?;
    }
    let store = SessionStore::open(storage, config);
    if store.file_path().exists() {
        return Ok(());
    }
    store.reset()
}
