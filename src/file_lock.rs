//! Advisory lock file guarding a store file across processes.
//!
//! The lock is a sibling file created with `create_new` holding an owner
//! token. Holders that crash leave it behind, so a lock older than
//! `stale_after` is reclaimed. Removal only happens while the token read back
//! is still the one that was judged (or written), so a lock recreated by
//! another process in the meantime survives.

use crate::errors::AppError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Timing knobs for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    pub stale_after: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5),
            max_retries: 20,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl LockSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            stale_after: Duration::from_millis(config.lock_stale_ms),
            max_retries: config.lock_max_retries,
            retry_delay: Duration::from_millis(config.lock_retry_delay_ms),
        }
    }
}

/// Held lock. Dropping it removes the lock file if it still carries our token.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    token: String,
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        match read_owner(&self.path) {
            Some(owner) if owner == self.token => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
                    }
                }
            }
            Some(_) => tracing::warn!(
                "Lock {} was taken over by another owner, leaving it in place",
                self.path.display()
            ),
            None => {}
        }
    }
}

/// Owner token stored in a lock file: pid, creation time and a random suffix.
fn owner_token() -> String {
    format!(
        "{} {} {}",
        std::process::id(),
        chrono::Utc::now().to_rfc3339(),
        uuid::Uuid::new_v4()
    )
}

/// Token of the current lock holder, `None` if the lock is gone.
pub fn read_owner(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| content.trim().to_string())
}

/// Outcome of a single acquisition attempt.
enum Attempt {
    Acquired(FileLock),
    Busy,
    Reclaimed,
}

fn try_create(path: &Path, stale_after: Duration) -> Result<Attempt, AppError> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => {
            let token = owner_token();
            if let Err(e) = writeln!(file, "{}", token) {
                let _ = std::fs::remove_file(path);
                return Err(AppError::StorageError(format!(
                    "write lock owner {}: {}",
                    path.display(),
                    e
                )));
            }
            Ok(Attempt::Acquired(FileLock {
                path: path.to_path_buf(),
                token,
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let Some(owner) = read_owner(path) else {
                // Released between our create and read.
                return Ok(Attempt::Reclaimed);
            };
            if !lock_age(path).is_some_and(|age| age > stale_after) {
                return Ok(Attempt::Busy);
            }
            // The stale verdict holds only for the owner it was made about.
            if read_owner(path).as_deref() != Some(owner.as_str()) {
                return Ok(Attempt::Busy);
            }

            tracing::warn!(
                "Removing stale lock {} (owner {}, older than {:?})",
                path.display(),
                owner,
                stale_after
            );
            match std::fs::remove_file(path) {
                Ok(()) => Ok(Attempt::Reclaimed),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Attempt::Reclaimed),
                Err(e) => Err(AppError::StorageError(format!(
                    "remove stale lock {}: {}",
                    path.display(),
                    e
                ))),
            }
        }
        Err(e) => Err(AppError::StorageError(format!(
            "create lock {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Age of an existing lock file, `None` if it vanished meanwhile.
pub fn lock_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

/// Acquire the lock at `path`, retrying up to `max_retries` times.
pub async fn acquire(path: &Path, settings: LockSettings) -> Result<FileLock, AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::StorageError(format!("create lock dir {}: {}", parent.display(), e))
        })?;
    }

    let mut waits = 0u32;
    loop {
        let lock_path = path.to_path_buf();
        let attempt =
            tokio::task::spawn_blocking(move || try_create(&lock_path, settings.stale_after))
                .await
                .map_err(|e| AppError::InternalError(format!("join lock task: {}", e)))??;

        match attempt {
            Attempt::Acquired(lock) => {
                if waits > 0 {
                    tracing::debug!("Acquired {} after {} retries", path.display(), waits);
                }
                return Ok(lock);
            }
            // Lock gone or stale lock removed; try again right away.
            Attempt::Reclaimed => continue,
            Attempt::Busy => {
                if waits >= settings.max_retries {
                    return Err(AppError::LockTimeout(format!(
                        "{} still held after {} retries",
                        path.display(),
                        waits
                    )));
                }
                waits += 1;
                tokio::time::sleep(settings.retry_delay).await;
            }
        }
    }
}
