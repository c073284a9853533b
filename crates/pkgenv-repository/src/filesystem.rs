//! Filesystem repository: `<root>/<family>/<version>/package.toml`.
//!
//! Roots are searched in order, the local development root first. A version
//! directory may carry a `.timestamp` file holding its publish time in epoch
//! seconds; without one, the metadata file's modification time is used, and
//! local packages are always considered published at time zero.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use pkgenv_core::metadata::{PackageMetadata, METADATA_FILE};
use pkgenv_core::version::Version;
use serde::{Deserialize, Serialize};

use crate::cache::{update_with_retry, CacheStore};
use crate::repository::{PackageVersion, Repository, RepositoryError};

/// File holding a version's publish time.
pub const TIMESTAMP_FILE: &str = ".timestamp";

const CACHE_WRITE_ATTEMPTS: usize = 5;

/// Metadata cache domain entry, keyed by resource path.
#[derive(Debug, Serialize, Deserialize)]
struct CachedMetadata {
    mtime: u64,
    metadata: PackageMetadata,
}

pub struct FsRepository {
    search_roots: Vec<PathBuf>,
    local_root: Option<PathBuf>,
    versions: Mutex<HashMap<String, Vec<PackageVersion>>>,
    metadata: Mutex<HashMap<PathBuf, (u64, Arc<PackageMetadata>)>>,
    store: Option<Arc<dyn CacheStore>>,
}

impl FsRepository {
    pub fn new(search_roots: Vec<PathBuf>, local_root: Option<PathBuf>) -> Self {
        Self {
            search_roots,
            local_root,
            versions: Mutex::new(HashMap::new()),
            metadata: Mutex::new(HashMap::new()),
            store: None,
        }
    }

    /// Persist parsed metadata through a shared cache store.
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// All roots in search order, flagged local or not.
    fn roots(&self) -> impl Iterator<Item = (&Path, bool)> {
        self.local_root
            .iter()
            .map(|r| (r.as_path(), true))
            .chain(self.search_roots.iter().map(|r| (r.as_path(), false)))
    }

    fn scan_family(&self, family: &str) -> Result<Vec<PackageVersion>, RepositoryError> {
        let mut found: HashMap<Version, PackageVersion> = HashMap::new();

        for (root, local) in self.roots() {
            let family_dir = root.join(family);
            let entries = match fs::read_dir(&family_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(RepositoryError::io(&family_dir, e)),
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                let version = match Version::parse(&name) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!("Skipping {}: {e}", path.display());
                        continue;
                    }
                };
                if found.contains_key(&version) {
                    continue;
                }
                let timestamp = if local { 0 } else { read_timestamp(&path) };
                found.insert(
                    version.clone(),
                    PackageVersion {
                        version,
                        timestamp,
                        base_path: path,
                        local,
                    },
                );
            }
        }

        let mut versions: Vec<PackageVersion> = found.into_values().collect();
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(versions)
    }

    fn load_cached(&self, key: &str, mtime: u64) -> Option<PackageMetadata> {
        let store = self.store.as_ref()?;
        let entry = match store.get(key) {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!("Metadata cache read failed for {key}: {e}");
                return None;
            }
        };
        let cached: CachedMetadata = serde_json::from_str(&entry.value).ok()?;
        (cached.mtime == mtime).then_some(cached.metadata)
    }

    fn store_cached(&self, key: &str, mtime: u64, metadata: &PackageMetadata) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let result = update_with_retry(store.as_ref(), key, CACHE_WRITE_ATTEMPTS, |current| {
            // Never replace an entry written for a newer file.
            let newer = current
                .and_then(|c| serde_json::from_str::<CachedMetadata>(c).ok())
                .is_some_and(|c| c.mtime >= mtime);
            if newer {
                return None;
            }
            serde_json::to_string(&CachedMetadata {
                mtime,
                metadata: metadata.clone(),
            })
            .ok()
        });
        if let Err(e) = result {
            tracing::warn!("Metadata cache write failed for {key}: {e}");
        }
    }
}

fn read_timestamp(version_dir: &Path) -> u64 {
    if let Ok(content) = fs::read_to_string(version_dir.join(TIMESTAMP_FILE)) {
        if let Ok(ts) = content.trim().parse::<u64>() {
            return ts;
        }
        tracing::warn!(
            "Ignoring malformed {} in {}",
            TIMESTAMP_FILE,
            version_dir.display()
        );
    }
    pkgenv_util::fs::modified_secs(&version_dir.join(METADATA_FILE)).unwrap_or(0)
}

impl Repository for FsRepository {
    fn family_exists(&self, family: &str) -> Result<bool, RepositoryError> {
        Ok(self.roots().any(|(root, _)| root.join(family).is_dir()))
    }

    fn versions(&self, family: &str) -> Result<Vec<PackageVersion>, RepositoryError> {
        if let Some(cached) = self
            .versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(family)
        {
            return Ok(cached.clone());
        }
        let scanned = self.scan_family(family)?;
        self.versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(family.to_string(), scanned.clone());
        Ok(scanned)
    }

    fn metadata(
        &self,
        family: &str,
        package: &PackageVersion,
    ) -> Result<Option<Arc<PackageMetadata>>, RepositoryError> {
        let path = package.base_path.join(METADATA_FILE);
        let mtime = match pkgenv_util::fs::modified_secs(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepositoryError::io(&path, e)),
        };

        if let Some((cached_mtime, meta)) = self
            .metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&path)
        {
            if *cached_mtime == mtime {
                return Ok(Some(Arc::clone(meta)));
            }
        }

        // Local packages change under development; they never reach the store.
        let key = format!("metadata:{}", path.display());
        let cached = if package.local {
            None
        } else {
            self.load_cached(&key, mtime)
        };
        let meta = match cached {
            Some(meta) => meta,
            None => {
                tracing::debug!("Parsing metadata for {family}-{}", package.version);
                let content = fs::read_to_string(&path).map_err(|e| RepositoryError::io(&path, e))?;
                let meta = PackageMetadata::parse_toml(&content).map_err(|e| {
                    RepositoryError::Metadata {
                        path: path.clone(),
                        message: e.to_string(),
                    }
                })?;
                if !package.local {
                    self.store_cached(&key, mtime, &meta);
                }
                meta
            }
        };

        let meta = Arc::new(meta);
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, (mtime, Arc::clone(&meta)));
        Ok(Some(meta))
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn cache_roots(&self) -> Vec<PathBuf> {
        self.search_roots.clone()
    }

    fn families_modified_between(&self, since: u64, until: u64) -> Option<bool> {
        for (root, local) in self.roots() {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(_) => return None,
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let mtime = pkgenv_util::fs::modified_secs(&path).ok()?;
                // Local packages are visible at every epoch.
                if mtime > since && (local || mtime <= until) {
                    return Some(true);
                }
            }
        }
        Some(false)
    }
}
