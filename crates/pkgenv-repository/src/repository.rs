//! Repository abstraction consumed by the resolver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::Diagnostic;
use pkgenv_core::metadata::PackageMetadata;
use pkgenv_core::version::Version;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RepositoryError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metadata in {}: {message}", path.display())]
    #[diagnostic(help("Check the package.toml of this package version"))]
    Metadata { path: PathBuf, message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl RepositoryError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One installed version of a package family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub version: Version,
    /// Epoch seconds at which the version was published.
    pub timestamp: u64,
    /// `<root>/<family>/<version>`.
    pub base_path: PathBuf,
    /// Found under the local development root.
    pub local: bool,
}

/// Read access to installed packages.
///
/// Implementations are queried synchronously from a single resolve but may be
/// shared between independent resolves.
pub trait Repository: Send + Sync {
    fn family_exists(&self, family: &str) -> Result<bool, RepositoryError>;

    /// Every installed version of `family`, ascending. When a version exists
    /// under several roots, the first root wins.
    fn versions(&self, family: &str) -> Result<Vec<PackageVersion>, RepositoryError>;

    /// Metadata of one installed version; `None` if it has no resource.
    fn metadata(
        &self,
        family: &str,
        package: &PackageVersion,
    ) -> Result<Option<Arc<PackageMetadata>>, RepositoryError>;

    /// Whether a resolved install path (base or variant) exists.
    fn path_exists(&self, path: &Path) -> bool;

    /// Non-local search roots, used to key the resolve cache.
    fn cache_roots(&self) -> Vec<PathBuf>;

    /// Whether any family directory changed in `(since, until]`. A change
    /// under the local development root counts whenever it is after `since`.
    ///
    /// `None` means the answer is not cheaply known; callers must then treat
    /// cached resolves as stale.
    fn families_modified_between(&self, since: u64, until: u64) -> Option<bool>;
}
