//! The output of a successful resolve.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metadata::PackageMetadata;
use crate::version::Version;

/// One package of a resolved environment, in dependency-first order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Version,
    /// `<root>/<family>/<version>`.
    pub base_path: PathBuf,
    /// Base path joined with the chosen variant, or the base path itself.
    pub root_path: PathBuf,
    /// Command templates, opaque to the resolver.
    pub commands: Vec<String>,
    pub metadata: PackageMetadata,
    /// Epoch seconds at which this version became available.
    pub timestamp: u64,
    /// True when the package came from the local development root.
    #[serde(default)]
    pub local: bool,
}

impl ResolvedPackage {
    /// `name-version`.
    pub fn short_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for ResolvedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}
