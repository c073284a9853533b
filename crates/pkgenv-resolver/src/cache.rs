//! Cache of complete resolves.
//!
//! A resolve is keyed by the repository roots, the options that change its
//! outcome and the full request list. A stored result stays valid while no
//! package family has been modified between the newest package it contains
//! and the epoch of the lookup. Resolves that picked up a local package are
//! never stored.

use std::path::PathBuf;
use std::sync::Arc;

use pkgenv_core::request::PackageRequest;
use pkgenv_core::resolved::ResolvedPackage;
use pkgenv_repository::cache::{update_with_retry, CacheStore};
use pkgenv_repository::Repository;
use serde::{Deserialize, Serialize};

use crate::conflict::ResolveError;
use crate::resolver::ResolveOptions;

const KEY_PREFIX: &str = "resolve:";
const WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
struct CachedResolve {
    packages: Vec<ResolvedPackage>,
    /// Publish time of the newest package in the result.
    max_timestamp: u64,
}

pub struct ResolveCache {
    store: Arc<dyn CacheStore>,
}

impl ResolveCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cache key for resolving `requests` (platform request included) over
    /// `roots` with `options`.
    pub fn key(roots: &[PathBuf], options: &ResolveOptions, requests: &[PackageRequest]) -> String {
        let mut parts: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
        parts.push(format!("mode={}", options.mode));
        parts.push(format!("transitive={}", options.assume_transitive));
        parts.push(format!("build={}", options.build_requires));
        parts.push(format!(
            "max-fails={}",
            options.max_fails.map_or_else(|| "-".to_string(), |n| n.to_string())
        ));
        parts.extend(requests.iter().map(ToString::to_string));
        format!("{KEY_PREFIX}{}", pkgenv_util::hash::sha256_parts(&parts))
    }

    /// A stored resolve, if one exists and is still valid at `epoch`.
    pub fn lookup(
        &self,
        key: &str,
        epoch: u64,
        repo: &dyn Repository,
    ) -> Option<Vec<ResolvedPackage>> {
        let entry = match self.store.get(key) {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!("Resolve cache read failed for {key}: {e}");
                return None;
            }
        };
        let cached: CachedResolve = match serde_json::from_str(&entry.value) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::debug!("Ignoring unreadable resolve cache entry {key}: {e}");
                return None;
            }
        };

        if epoch <= cached.max_timestamp {
            tracing::debug!("Resolve cache entry {key} is newer than epoch {epoch}");
            return None;
        }
        match repo.families_modified_between(cached.max_timestamp, epoch) {
            Some(false) => Some(cached.packages),
            Some(true) => {
                tracing::debug!("Resolve cache entry {key} is stale");
                None
            }
            None => {
                tracing::debug!("Repository cannot validate resolve cache entry {key}");
                None
            }
        }
    }

    /// Store a resolve. Returns whether anything was written.
    pub fn store(&self, key: &str, packages: &[ResolvedPackage]) -> Result<bool, ResolveError> {
        if packages.iter().any(|p| p.local) {
            tracing::debug!("Not caching resolve {key}: it contains local packages");
            return Ok(false);
        }
        let value = serde_json::to_string(&CachedResolve {
            packages: packages.to_vec(),
            max_timestamp: packages.iter().map(|p| p.timestamp).max().unwrap_or(0),
        })
        .map_err(|e| ResolveError::Cache {
            message: format!("failed to serialize resolve: {e}"),
        })?;
        update_with_retry(self.store.as_ref(), key, WRITE_ATTEMPTS, |_| {
            Some(value.clone())
        })
        .map_err(|e| ResolveError::Cache {
            message: e.to_string(),
        })
    }
}
