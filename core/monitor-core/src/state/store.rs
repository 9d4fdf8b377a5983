//! File-backed session store.
//!
//! Many short-lived hook processes write `sessions.json`; the renderer reads
//! it once a second. There is no daemon, so every operation re-reads the file.
//!
//! # Writers
//!
//! Every mutation is a read-modify-write under the [`StoreLock`], so two hooks
//! updating different sessions never clobber each other, and each computes its
//! transition against a freshly read document.
//!
//! # Readers
//!
//! Writes go to a temp file in the same directory and are renamed over the
//! document, so readers never see a partial write and don't need the lock.
//!
//! # Corruption
//!
//! A document that fails to parse is moved aside to `sessions.json.corrupt`
//! and replaced by an empty one. Losing display state is cheap; failing the
//! assistant's hook is not.

use fs_err as fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::config::{MonitorConfig, DEFAULT_LOCK_TIMEOUT_MS};
use crate::error::{MonitorError, Result};
use crate::storage::StorageConfig;
use crate::types::Session;

use super::lock::StoreLock;
use super::types::{HookEvent, SessionStoreDocument};

/// Durable session id → session mapping shared between processes.
///
/// Create with [`SessionStore::open`] for the configured location, or
/// [`SessionStore::new`] with explicit paths for tests.
#[derive(Debug, Clone)]
pub struct SessionStore {
    file_path: PathBuf,
    lock_dir: PathBuf,
    lock_timeout: Duration,
}

impl SessionStore {
    pub fn new(file_path: &Path, lock_dir: &Path) -> Self {
        SessionStore {
            file_path: file_path.to_path_buf(),
            lock_dir: lock_dir.to_path_buf(),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }

    pub fn open(storage: &StorageConfig, config: &MonitorConfig) -> Self {
        SessionStore::new(&storage.sessions_file(), &storage.sessions_lock_dir())
            .with_lock_timeout(config.lock_timeout())
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Applies one hook event and returns the resulting session.
    ///
    /// Unknown event names are rejected before the lock is taken, so they
    /// never touch the document.
    pub fn apply_event(&self, event: &HookEvent) -> Result<Session> {
        let kind = event.kind()?;

        let _lock = self.lock()?;
        let mut document = self.load_for_write()?;
        let session = document.apply(event, kind);
        self.save(&document)?;

        tracing::debug!(
            session = %session.id,
            event = %kind,
            state = %session.state,
            "Applied hook event"
        );
        Ok(session)
    }

    /// Returns the current document without taking the lock.
    ///
    /// On unparsable content, makes one bounded attempt to take the lock and
    /// recover. If the lock can't be had, the corruption is reported instead.
    pub fn read_all(&self) -> Result<SessionStoreDocument> {
        let details = match self.read_document()? {
            Ok(document) => return Ok(document),
            Err(details) => details,
        };

        let _lock = self.lock().map_err(|err| {
            tracing::warn!(error = %err, "Could not lock corrupt store for recovery");
            MonitorError::StoreCorrupt {
                path: self.file_path.clone(),
                details: details.clone(),
            }
        })?;

        // A writer may have replaced the document while we waited.
        match self.read_document()? {
            Ok(document) => Ok(document),
            Err(details) => {
                self.quarantine(&details)?;
                let document = SessionStoreDocument::default();
                self.save(&document)?;
                Ok(document)
            }
        }
    }

    /// Replaces the document with an empty one.
    pub fn reset(&self) -> Result<()> {
        let _lock = self.lock()?;
        self.save(&SessionStoreDocument::default())?;
        tracing::info!(path = %self.file_path.display(), "Session store reset");
        Ok(())
    }

    /// Removes finished sessions and sessions quiet for `stale_after_secs`.
    ///
    /// Returns the number removed. Running it twice removes nothing the
    /// second time.
    pub fn collect_garbage(&self, now: i64, stale_after_secs: i64) -> Result<usize> {
        let _lock = self.lock()?;
        let mut document = self.load_for_write()?;
        let removed = document.remove_inactive(now, stale_after_secs);
        if removed > 0 {
            self.save(&document)?;
            tracing::debug!(removed, "Collected inactive sessions");
        }
        Ok(removed)
    }

    fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.lock_dir, self.lock_timeout)
    }

    /// Outer error: the file couldn't be read. Inner error: it couldn't be parsed.
    fn read_document(&self) -> Result<std::result::Result<SessionStoreDocument, String>> {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Ok(SessionStoreDocument::default()))
            }
            Err(err) => return Err(MonitorError::io("read session store")(err)),
        };
        Ok(SessionStoreDocument::parse(&content))
    }

    /// Must be called with the lock held.
    fn load_for_write(&self) -> Result<SessionStoreDocument> {
        match self.read_document()? {
            Ok(document) => Ok(document),
            Err(details) => {
                self.quarantine(&details)?;
                Ok(SessionStoreDocument::default())
            }
        }
    }

    fn quarantine(&self, details: &str) -> Result<()> {
        let aside = corrupt_path(&self.file_path);
        tracing::warn!(
            path = %self.file_path.display(),
            moved_to = %aside.display(),
            details,
            "Session store corrupt, resetting to empty"
        );
        match fs::rename(&self.file_path, &aside) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MonitorError::io("move corrupt session store aside")(err)),
        }
    }

    fn save(&self, document: &SessionStoreDocument) -> Result<()> {
        let content = document.to_json()?;

        let parent_dir = self
            .file_path
            .parent()
            .ok_or_else(|| MonitorError::Io {
                context: "session store path has no parent directory".to_string(),
                source: ErrorKind::InvalidInput.into(),
            })?;
        fs::create_dir_all(parent_dir).map_err(MonitorError::io("create store directory"))?;

        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(MonitorError::io("create temp store file"))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(MonitorError::io("write temp store file"))?;
        temp_file
            .flush()
            .map_err(MonitorError::io("flush temp store file"))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|e| MonitorError::io("replace session store")(e.error))?;

        Ok(())
    }
}

fn corrupt_path(file_path: &Path) -> PathBuf {
    let mut name = file_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".corrupt");
    file_path.with_file_name(name)
}
