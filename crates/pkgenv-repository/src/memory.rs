//! In-memory repository for tests and embedders.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use pkgenv_core::metadata::PackageMetadata;
use pkgenv_core::version::{Version, VersionError};

use crate::repository::{PackageVersion, Repository, RepositoryError};

const MEMORY_ROOT: &str = "/memory";
const LOCAL_ROOT: &str = "/memory-local";

#[derive(Debug, Clone)]
struct Entry {
    package: PackageVersion,
    metadata: Option<Arc<PackageMetadata>>,
}

#[derive(Debug, Default)]
struct State {
    families: BTreeMap<String, Vec<Entry>>,
    /// Family modification times, epoch seconds.
    modified: BTreeMap<String, Vec<u64>>,
    /// Wall-clock times of local additions; local packages are visible at
    /// every epoch.
    local_modified: Vec<u64>,
    missing_paths: HashSet<PathBuf>,
}

/// A repository held entirely in memory.
///
/// Family modification times default to the publish time of each added
/// version and can be bumped with [`MemoryRepository::touch_family`]. Local
/// additions are recorded at the current time.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
    version_queries: AtomicUsize,
    metadata_queries: AtomicUsize,
    track_modifications: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            track_modifications: true,
            ..Self::default()
        }
    }

    /// A repository that cannot answer modification queries cheaply.
    pub fn without_modification_tracking() -> Self {
        Self::default()
    }

    /// Add a published version with the given metadata.
    pub fn add(
        &self,
        family: &str,
        version: &str,
        timestamp: u64,
        metadata: PackageMetadata,
    ) -> Result<(), VersionError> {
        self.insert(family, version, timestamp, Some(metadata), false)
    }

    /// Add a version under the local development root.
    pub fn add_local(
        &self,
        family: &str,
        version: &str,
        metadata: PackageMetadata,
    ) -> Result<(), VersionError> {
        self.insert(family, version, 0, Some(metadata), true)
    }

    /// Add a version directory that has no metadata resource.
    pub fn add_without_metadata(
        &self,
        family: &str,
        version: &str,
        timestamp: u64,
    ) -> Result<(), VersionError> {
        self.insert(family, version, timestamp, None, false)
    }

    fn insert(
        &self,
        family: &str,
        version: &str,
        timestamp: u64,
        metadata: Option<PackageMetadata>,
        local: bool,
    ) -> Result<(), VersionError> {
        let version = Version::parse(version)?;
        let root = if local { LOCAL_ROOT } else { MEMORY_ROOT };
        let base_path = Path::new(root).join(family).join(version.to_string());

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = state.families.entry(family.to_string()).or_default();
        entries.retain(|e| e.package.version != version);
        entries.push(Entry {
            package: PackageVersion {
                version,
                timestamp,
                base_path,
                local,
            },
            metadata: metadata.map(Arc::new),
        });
        entries.sort_by(|a, b| a.package.version.cmp(&b.package.version));
        if local {
            state.local_modified.push(pkgenv_util::fs::now_secs());
        } else {
            state
                .modified
                .entry(family.to_string())
                .or_default()
                .push(timestamp);
        }
        Ok(())
    }

    /// Record a modification of `family` at `timestamp`.
    pub fn touch_family(&self, family: &str, timestamp: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .modified
            .entry(family.to_string())
            .or_default()
            .push(timestamp);
    }

    /// Make an install path report as missing.
    pub fn remove_path(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.missing_paths.insert(path.into());
    }

    /// Base path a version added with [`MemoryRepository::add`] lives at.
    pub fn base_path(family: &str, version: &str) -> PathBuf {
        Path::new(MEMORY_ROOT).join(family).join(version)
    }

    /// Number of `versions` calls served so far.
    pub fn version_queries(&self) -> usize {
        self.version_queries.load(Ordering::SeqCst)
    }

    /// Number of `metadata` calls served so far.
    pub fn metadata_queries(&self) -> usize {
        self.metadata_queries.load(Ordering::SeqCst)
    }
}

impl Repository for MemoryRepository {
    fn family_exists(&self, family: &str) -> Result<bool, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.families.contains_key(family))
    }

    fn versions(&self, family: &str) -> Result<Vec<PackageVersion>, RepositoryError> {
        self.version_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut versions: Vec<PackageVersion> = Vec::new();
        // Local entries shadow published ones of the same version.
        for entry in state.families.get(family).into_iter().flatten() {
            match versions
                .iter_mut()
                .find(|v| v.version == entry.package.version)
            {
                Some(existing) if entry.package.local => *existing = entry.package.clone(),
                Some(_) => {}
                None => versions.push(entry.package.clone()),
            }
        }
        Ok(versions)
    }

    fn metadata(
        &self,
        family: &str,
        package: &PackageVersion,
    ) -> Result<Option<Arc<PackageMetadata>>, RepositoryError> {
        self.metadata_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .families
            .get(family)
            .into_iter()
            .flatten()
            .find(|e| e.package.base_path == package.base_path)
            .and_then(|e| e.metadata.clone()))
    }

    fn path_exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        !state.missing_paths.contains(path)
    }

    fn cache_roots(&self) -> Vec<PathBuf> {
        vec![PathBuf::from(MEMORY_ROOT)]
    }

    fn families_modified_between(&self, since: u64, until: u64) -> Option<bool> {
        if !self.track_modifications {
            return None;
        }
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let published = state
            .modified
            .values()
            .flatten()
            .any(|&t| t > since && t <= until);
        Some(published || state.local_modified.iter().any(|&t| t > since))
    }
}
