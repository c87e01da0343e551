//! Advisory exclusive file lock guarding against concurrent instances.
//!
//! Ports `fl.c`/`fl.h`: opens (creating if needed) a lock file, takes a
//! non-blocking `flock(2)` exclusive lock on it, and removes the file on
//! release. A contended lock surfaces as a user-facing error mentioning that
//! another instance may already be running.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// A held exclusive lock on a file. Dropping it (or calling [`FileLock::release`]
/// explicitly) unlocks and deletes the underlying file.
pub struct FileLock {
    path: PathBuf,
    file: std::fs::File,
}

impl FileLock {
    /// Creates (0o644, truncating) `path` and attempts a non-blocking
    /// exclusive `flock`. Fails immediately if another process already holds
    /// it, rather than blocking — matching the original's `LOCK_EX | LOCK_NB`.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .mode(0o644)
            .open(&path)
            .with_context(|| format!("opening lock file {path:?}"))?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                bail!(
                    "failed to lock {path:?}: another instance may be running"
                );
            }
            return Err(err).with_context(|| format!("locking {path:?}"));
        }

        Ok(FileLock { path, file })
    }

    /// Releases the lock, closes the file descriptor, and removes the lock
    /// file. Errors removing the file are logged, not propagated — by the
    /// time we're releasing, the caller's real work is already done.
    pub fn release(self) {
        let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if rc != 0 {
            log::warn!(
                "unlocking {:?} failed: {}",
                self.path,
                std::io::Error::last_os_error()
            );
        }
        drop(self.file);
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("removing lock file {:?} failed: {e}", self.path);
        }
    }
}
