//! Advisory locking for lifecycle operations.
//!
//! Install, update, rollback and uninstall mutate the same OS-external state
//! (installation root, movable pointer, unit files). An [`OperationLock`] held
//! for the mutating phase keeps two administrators, or an administrator and the
//! update timer, from interleaving. The lock is an exclusive `fs4` lock on a
//! file in the directory being mutated and is released when dropped.
//!
//! # Async Safety
//!
//! File operations run in `spawn_blocking` so the runtime is never blocked by
//! a slow file system.

use crate::constants::{LOCK_FILE_NAME, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::PiriError;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

/// Exclusive advisory lock over a lifecycle directory.
#[derive(Debug)]
pub struct OperationLock {
    _file: Arc<File>,
    lock_path: PathBuf,
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        debug!(path = %self.lock_path.display(), "Operation lock released");
        if let Err(e) = std::fs::remove_file(&self.lock_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %self.lock_path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

impl OperationLock {
    /// Acquire the lock in `dir`, waiting up to `timeout` for another holder.
    ///
    /// `dir` is created if missing. Fails with [`PiriError::LockContention`]
    /// once the timeout elapses.
    pub async fn acquire(dir: &Path, timeout: Duration) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create lock directory: {}", dir.display()))?;

        let lock_path = dir.join(LOCK_FILE_NAME);
        debug!(path = %lock_path.display(), "Waiting for operation lock");

        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .with_context(|| "spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        let file = Arc::new(file);
        let start = std::time::Instant::now();

        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let file_clone = Arc::clone(&file);
            let lock_result = tokio::task::spawn_blocking(move || file_clone.try_lock_exclusive())
                .await
                .with_context(|| "spawn_blocking panicked")?;

            match lock_result {
                Ok(true) => {
                    debug!(
                        path = %lock_path.display(),
                        wait_ms = start.elapsed().as_millis(),
                        "Operation lock acquired"
                    );
                    return Ok(Self {
                        _file: file,
                        lock_path,
                    });
                }
                Ok(false) | Err(_) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        break;
                    }
                    tokio::time::sleep(delay.min(remaining)).await;
                }
            }
        }

        Err(PiriError::LockContention {
            path: lock_path.display().to_string(),
        }
        .into())
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}
