//! Store lock for serializing read-modify-write cycles on sessions.json.
//!
//! The lock is a directory created with `mkdir`, which is atomic on every
//! filesystem we care about. The holder writes its PID inside so waiters can
//! tell a crashed holder from a slow one.
//!
//! # Lock Directory Structure
//!
//! ```text
//! sessions.lock/
//! └── pid          # Plain text: "<process id> <nonce>"
//! ```
//!
//! The nonce tells two holders in the same process apart, so a holder only
//! ever removes the lock it created.
//!
//! # Breaking Stale Locks
//!
//! A lock is broken when its holder PID is dead, or when it is older than
//! [`STALE_LOCK_AGE`] (covers PID reuse and unreadable pid files). Hooks hold
//! the lock for a millisecond or two, so a lock that old is abandoned.
//!
//! Breaking renames the directory to a unique tombstone first, so two waiters
//! racing to break the same stale lock can't both delete a fresh one.

use fs_err as fs;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::error::{MonitorError, Result};

/// Locks older than this are treated as abandoned regardless of PID.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

const MIN_BACKOFF_MS: u64 = 2;
const MAX_BACKOFF_MS: u64 = 25;

pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // SAFETY: kill with signal 0 only checks for existence and permission.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(pid as i32, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Held store lock. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    dir: PathBuf,
    owner: String,
}

impl StoreLock {
    /// Acquires the lock, waiting at most `timeout`.
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        let deadline = started + timeout;

        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(MonitorError::io("create lock parent"))?;
        }

        loop {
            match try_create(dir) {
                Ok(lock) => return Ok(lock),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(dir) {
                        break_stale(dir);
                        continue;
                    }
                }
                Err(err) => {
                    return Err(MonitorError::Io {
                        context: format!("create lock {}", dir.display()),
                        source: err,
                    })
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(MonitorError::LockTimeout {
                    path: dir.to_path_buf(),
                    waited_ms: now.duration_since(started).as_millis() as u64,
                });
            }

            let jitter_ms = rand::thread_rng().gen_range(MIN_BACKOFF_MS..=MAX_BACKOFF_MS);
            thread::sleep(Duration::from_millis(jitter_ms).min(deadline - now));
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Broken as stale while we held it; the directory is someone else's now.
        if read_lock_owner(&self.dir).as_deref() != Some(self.owner.as_str()) {
            tracing::warn!(
                path = %self.dir.display(),
                "Store lock was taken over, leaving it in place"
            );
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.dir) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %err, "Failed to release store lock");
            }
        }
    }
}

fn try_create(dir: &Path) -> std::io::Result<StoreLock> {
    fs::create_dir(dir)?;
    let owner = format!("{} {:016x}", std::process::id(), rand::thread_rng().gen::<u64>());
    if let Err(err) = fs::write(dir.join("pid"), &owner) {
        let _ = fs::remove_dir_all(dir);
        return Err(err);
    }
    Ok(StoreLock {
        dir: dir.to_path_buf(),
        owner,
    })
}

fn read_lock_owner(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join("pid")).ok()?;
    let owner = content.trim();
    (!owner.is_empty()).then(|| owner.to_string())
}

fn read_lock_pid(dir: &Path) -> Option<u32> {
    read_lock_owner(dir)?.split_whitespace().next()?.parse().ok()
}

fn lock_age(dir: &Path) -> Option<Duration> {
    let modified = fs::metadata(dir).ok()?.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default(),
    )
}

fn is_stale(dir: &Path) -> bool {
    if lock_age(dir).is_some_and(|age| age > STALE_LOCK_AGE) {
        return true;
    }
    // No pid yet means the holder is between mkdir and write; give it time.
    match read_lock_pid(dir) {
        Some(pid) => !is_pid_alive(pid),
        None => false,
    }
}

fn break_stale(dir: &Path) {
    let stale_owner = read_lock_owner(dir);
    let stale_pid = read_lock_pid(dir);
    let tombstone = dir.with_extension(format!(
        "stale.{}.{}",
        std::process::id(),
        rand::thread_rng().gen::<u32>()
    ));

    if fs::rename(dir, &tombstone).is_err() {
        // Someone else already moved or released it.
        return;
    }

    // If the owner changed between the check and the rename we grabbed a
    // fresh lock by mistake; put it back.
    if read_lock_owner(&tombstone) != stale_owner {
        if fs::rename(&tombstone, dir).is_err() {
            tracing::warn!(path = %dir.display(), "Failed to restore a live store lock");
        }
        return;
    }

    tracing::warn!(
        path = %dir.display(),
        pid = ?stale_pid,
        "Broke stale store lock"
    );
    let _ = fs::remove_dir_all(&tombstone);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_and_release() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("sessions.lock");
        {
            let lock = StoreLock::acquire(&dir, Duration::from_millis(100)).unwrap();
            assert!(lock.path().is_dir());
            assert_eq!(read_lock_pid(&dir), Some(std::process::id()));
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_held_lock_times_out() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("sessions.lock");
        let _held = StoreLock::acquire(&dir, Duration::from_millis(100)).unwrap();

        let err = StoreLock::acquire(&dir, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, MonitorError::LockTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_lock_reacquired_after_release() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("sessions.lock");
        drop(StoreLock::acquire(&dir, Duration::from_millis(100)).unwrap());
        assert!(StoreLock::acquire(&dir, Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn test_dead_holder_lock_is_broken() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("sessions.lock");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("pid"), "99999999").unwrap();

        let lock = StoreLock::acquire(&dir, Duration::from_millis(200)).unwrap();
        assert_eq!(read_lock_pid(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn test_lock_without_pid_is_respected_while_fresh() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("sessions.lock");
        std::fs::create_dir(&dir).unwrap();

        let err = StoreLock::acquire(&dir, Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, MonitorError::LockTimeout { .. }));
    }

    #[test]
    fn test_drop_leaves_lock_taken_over_by_another_holder() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("sessions.lock");
        let lock = StoreLock::acquire(&dir, Duration::from_millis(100)).unwrap();

        // Another holder broke ours as stale and created its own.
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("pid"), format!("{} feedface", std::process::id())).unwrap();

        drop(lock);
        assert!(dir.is_dir());
        assert_eq!(
            read_lock_owner(&dir).as_deref(),
            Some(format!("{} feedface", std::process::id()).as_str())
        );
    }

    #[test]
    fn test_two_holders_in_one_process_have_distinct_owners() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("sessions.lock");
        let first = StoreLock::acquire(&dir, Duration::from_millis(100)).unwrap();
        let first_owner = first.owner.clone();
        drop(first);
        let second = StoreLock::acquire(&dir, Duration::from_millis(100)).unwrap();
        assert_ne!(second.owner, first_owner);
    }

    #[test]
    fn test_own_pid_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }
}
