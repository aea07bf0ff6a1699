//! Index directory lifecycle: state, locking and reset.

use crate::index::manifest::{Manifest, MANIFEST_FILE};
use chrono::{DateTime, Utc};
use docent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::OwnedMutexGuard;
use walkdir::WalkDir;

/// Observable state of an index directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// No usable index
    Absent,
    /// A build or reset currently holds the lock
    Building,
    /// A complete index is on disk
    Ready,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Absent => "absent",
            IndexState::Building => "building",
            IndexState::Ready => "ready",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetOutcome {
    Removed,
    NothingToRemove,
}

/// Contents of the lock file: who took the lock and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    /// True only when the holding process is known to have exited.
    fn is_stale(&self) -> bool {
        self.pid != std::process::id() && process_alive(self.pid) == Some(false)
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> Option<bool> {
    Some(Path::new("/proc").join(pid.to_string()).exists())
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> Option<bool> {
    None
}

/// Summary reported by `docent stats`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub dir: PathBuf,
    pub state: IndexState,
    pub manifest: Option<Manifest>,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_holder: Option<LockHolder>,
}

/// Owns one index directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

/// Held for the duration of a build or reset. Dropping it releases the
/// lock file and the in-process mutex.
#[derive(Debug)]
pub struct IndexLock {
    lock_file: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_file) {
            tracing::warn!("Failed to remove lock file {:?}: {}", self.lock_file, e);
        }
    }
}

/// One async mutex per index directory for this process.
fn directory_mutex(dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>> =
        OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    Arc::clone(locks.entry(dir.to_path_buf()).or_default())
}

/// Create the lock file exclusively and record the holder in it.
fn create_lock_file(path: &Path) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    let written = serde_json::to_vec(&LockHolder::current())
        .map_err(std::io::Error::from)
        .and_then(|bytes| file.write_all(&bytes))
        .and_then(|_| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sibling lock file: `.<name>.lock`.
    pub fn lock_path(&self) -> PathBuf {
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index".to_string());
        let parent = self.dir.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!(".{}.lock", name))
    }

    /// Holder recorded in the lock file, if one exists and is readable.
    pub fn lock_holder(&self) -> Option<LockHolder> {
        let bytes = fs::read(self.lock_path()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Whether a complete index is on disk, regardless of any lock.
    pub fn has_index(&self) -> bool {
        self.dir.join(MANIFEST_FILE).is_file()
    }

    /// Building while a lock file exists whose holder is not known to be
    /// dead; an unreadable lock file counts as held.
    pub fn state(&self) -> IndexState {
        let lock_held = self.lock_path().exists()
            && !self.lock_holder().is_some_and(|holder| holder.is_stale());
        if lock_held {
            IndexState::Building
        } else if self.has_index() {
            IndexState::Ready
        } else {
            IndexState::Absent
        }
    }

    /// Acquire the build/reset lock for this directory.
    ///
    /// Waits for other holders in this process. A lock file left by a
    /// process that has exited is replaced; one held by a live or unknown
    /// process fails immediately with [`AppError::IndexLocked`].
    pub async fn lock(&self) -> AppResult<IndexLock> {
        self.acquire(false).await
    }

    async fn acquire(&self, force: bool) -> AppResult<IndexLock> {
        let guard = directory_mutex(&self.dir).lock_owned().await;

        let lock_file = self.lock_path();
        if let Some(parent) = lock_file.parent() {
            fs::create_dir_all(parent)?;
        }

        match create_lock_file(&lock_file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = self.lock_holder();
                let stale = holder.as_ref().is_some_and(LockHolder::is_stale);
                if !(force || stale) {
                    return Err(AppError::IndexLocked {
                        dir: self.dir.clone(),
                        lock_file,
                    });
                }
                tracing::warn!(
                    holder = ?holder,
                    forced = force,
                    "Replacing lock file {:?}",
                    lock_file
                );
                fs::remove_file(&lock_file)?;
                create_lock_file(&lock_file)?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired index lock {:?}", lock_file);
        Ok(IndexLock {
            lock_file,
            _guard: guard,
        })
    }

    /// Delete the index directory. Idempotent.
    pub async fn reset(&self) -> AppResult<ResetOutcome> {
        self.reset_with(false).await
    }

    /// Like [`IndexStore::reset`], but clears a lock file left by another
    /// process. Only safe when no build is actually running.
    pub async fn force_reset(&self) -> AppResult<ResetOutcome> {
        self.reset_with(true).await
    }

    async fn reset_with(&self, force: bool) -> AppResult<ResetOutcome> {
        let _lock = self.acquire(force).await?;
        self.remove_stale_siblings();

        if !self.dir.exists() {
            tracing::info!("No index at {:?}, nothing to remove", self.dir);
            return Ok(ResetOutcome::NothingToRemove);
        }

        fs::remove_dir_all(&self.dir)?;
        tracing::info!("Removed index at {:?}", self.dir);
        Ok(ResetOutcome::Removed)
    }

    /// Remove staging directories left behind by interrupted builds.
    fn remove_stale_siblings(&self) {
        let (Some(parent), Some(name)) = (self.dir.parent(), self.dir.file_name()) else {
            return;
        };
        let tmp_prefix = format!(".{}.tmp-", name.to_string_lossy());
        let old_prefix = format!(".{}.old-", name.to_string_lossy());

        let Ok(entries) = fs::read_dir(parent) else {
            return;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with(&tmp_prefix) || file_name.starts_with(&old_prefix) {
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    tracing::warn!("Failed to remove {:?}: {}", entry.path(), e);
                }
            }
        }
    }

    pub fn stats(&self) -> AppResult<IndexStats> {
        let state = self.state();
        let manifest = if self.has_index() {
            Some(Manifest::read(&self.dir)?)
        } else {
            None
        };

        let size_bytes = if self.dir.exists() {
            WalkDir::new(&self.dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum()
        } else {
            0
        };

        Ok(IndexStats {
            dir: self.dir.clone(),
            state,
            manifest,
            size_bytes,
            lock_holder: self.lock_holder(),
        })
    }
}
