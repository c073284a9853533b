//! Key-value cache stores with optimistic concurrency.
//!
//! Every read returns the stored value together with a token. Writes are
//! conditional on that token (check-and-set) so that concurrent resolver
//! processes never blindly overwrite each other; on a token mismatch the
//! writer re-reads and retries.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::repository::RepositoryError;

/// Version token of a stored value.
pub type CacheToken = u64;

/// A stored value and the token it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub token: CacheToken,
    pub value: String,
}

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, RepositoryError>;

    /// Store `value` only if the current token equals `expected` (`None`
    /// meaning the key must be absent). Returns `false` on a mismatch.
    fn compare_and_set(
        &self,
        key: &str,
        value: &str,
        expected: Option<CacheToken>,
    ) -> Result<bool, RepositoryError>;
}

/// Read-modify-write `key` with check-and-set, retrying from a fresh read on
/// conflict.
///
/// `update` receives the current value and returns the value to store, or
/// `None` to leave the entry alone. Returns whether a write happened.
pub fn update_with_retry<F>(
    store: &dyn CacheStore,
    key: &str,
    attempts: usize,
    mut update: F,
) -> Result<bool, RepositoryError>
where
    F: FnMut(Option<&str>) -> Option<String>,
{
    for _ in 0..attempts {
        let current = store.get(key)?;
        let Some(value) = update(current.as_ref().map(|e| e.value.as_str())) else {
            return Ok(false);
        };
        if store.compare_and_set(key, &value, current.map(|e| e.token))? {
            return Ok(true);
        }
        tracing::debug!("Cache entry {key} changed concurrently, retrying");
    }
    tracing::warn!("Giving up on cache entry {key} after {attempts} conflicting writes");
    Ok(false)
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, RepositoryError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn compare_and_set(
        &self,
        key: &str,
        value: &str,
        expected: Option<CacheToken>,
    ) -> Result<bool, RepositoryError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let current = entries.get(key).map(|e| e.token);
        if current != expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                token: current.map_or(1, |t| t + 1),
                value: value.to_string(),
            },
        );
        Ok(true)
    }
}

const LOCK_ATTEMPTS: u32 = 100;
const LOCK_BACKOFF: Duration = Duration::from_millis(10);
/// A lock older than this was left behind by a writer that died.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(10);

/// Directory-backed store shared between processes.
///
/// Each key lives in `<dir>/<sha256(key)>.json`. The check-and-set runs
/// inside a short critical section guarded by an exclusive `.lock` file;
/// locks older than a few seconds are broken.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        pkgenv_util::fs::ensure_dir(&root).map_err(|e| RepositoryError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = pkgenv_util::hash::sha256_bytes(key.as_bytes());
        self.root.join(format!("{hash}.json"))
    }

    fn read_entry(path: &Path) -> Result<Option<CacheEntry>, RepositoryError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepositoryError::io(path, e)),
        };
        match serde_json::from_str(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache entry {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn lock(&self, entry: &Path) -> Result<LockGuard, RepositoryError> {
        let lock_path = entry.with_extension("lock");
        for _ in 0..LOCK_ATTEMPTS {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => return Ok(LockGuard { path: lock_path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::break_stale_lock(&lock_path) {
                        continue;
                    }
                    std::thread::sleep(LOCK_BACKOFF);
                }
                Err(e) => return Err(RepositoryError::io(&lock_path, e)),
            }
        }
        Err(RepositoryError::Cache {
            message: format!("timed out waiting for {}", lock_path.display()),
        })
    }

    /// Remove `lock_path` if it is stale. Returns whether it is gone.
    fn break_stale_lock(lock_path: &Path) -> bool {
        let age = fs::metadata(lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        if !age.is_some_and(|age| age > LOCK_STALE_AFTER) {
            return false;
        }
        tracing::warn!("Breaking stale cache lock {}", lock_path.display());
        match fs::remove_file(lock_path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                tracing::warn!("Failed to remove stale lock {}: {e}", lock_path.display());
                false
            }
        }
    }
}

struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove cache lock {}: {e}", self.path.display());
        }
    }
}

impl CacheStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, RepositoryError> {
        Self::read_entry(&self.entry_path(key))
    }

    fn compare_and_set(
        &self,
        key: &str,
        value: &str,
        expected: Option<CacheToken>,
    ) -> Result<bool, RepositoryError> {
        let path = self.entry_path(key);
        let _guard = self.lock(&path)?;

        let current = Self::read_entry(&path)?.map(|e| e.token);
        if current != expected {
            return Ok(false);
        }

        let entry = CacheEntry {
            token: current.map_or(1, |t| t + 1),
            value: value.to_string(),
        };
        let json = serde_json::to_string(&entry).map_err(|e| RepositoryError::Cache {
            message: format!("failed to encode entry for {key}: {e}"),
        })?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.root).map_err(|e| RepositoryError::io(&self.root, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| RepositoryError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| RepositoryError::io(&path, e.error))?;
        Ok(true)
    }
}
