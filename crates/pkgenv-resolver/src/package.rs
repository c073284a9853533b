//! Per-family resolution state owned by a configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgenv_core::metadata::PackageMetadata;
use pkgenv_core::request::{PackageRequest, RequestError};
use pkgenv_core::version::{Version, VersionRange};
use pkgenv_repository::PackageVersion;

/// One alternative set of sibling requests declared by a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVariant {
    /// Declared request strings; the install path is built from these.
    names: Vec<String>,
    requests: Vec<PackageRequest>,
    /// Requests not yet hoisted into the configuration.
    working: Vec<PackageRequest>,
}

impl PackageVariant {
    /// Every variant `metadata` declares, in declaration order.
    pub fn declared_by(metadata: &PackageMetadata) -> Result<Vec<Self>, RequestError> {
        let parsed = metadata.variant_requests()?;
        Ok(metadata
            .variants
            .iter()
            .zip(parsed)
            .map(|(names, requests)| Self {
                names: names.clone(),
                working: requests.clone(),
                requests,
            })
            .collect())
    }

    pub fn requests(&self) -> &[PackageRequest] {
        &self.requests
    }

    pub fn working(&self) -> &[PackageRequest] {
        &self.working
    }

    /// True once every request has been hoisted.
    pub fn is_settled(&self) -> bool {
        self.working.is_empty()
    }

    /// Families named by the declared requests, in declaration order.
    pub fn families(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in &self.requests {
            if !out.contains(&r.family.as_str()) {
                out.push(&r.family);
            }
        }
        out
    }

    /// Union of the non-anti working ranges this variant puts on `family`.
    pub fn working_range(&self, family: &str) -> Option<VersionRange> {
        self.working
            .iter()
            .filter(|r| !r.is_anti() && r.family == family)
            .map(|r| r.range.clone())
            .reduce(|a, b| a.union(&b))
    }

    /// Drop the non-anti working requests on `family`.
    pub fn strip(&mut self, family: &str) {
        self.working.retain(|r| r.is_anti() || r.family != family);
    }

    /// Take the whole working list, leaving it empty.
    pub fn take_working(&mut self) -> Vec<PackageRequest> {
        std::mem::take(&mut self.working)
    }

    /// `base/<request>/<request>...` in declaration order.
    pub fn path(&self, base: &Path) -> PathBuf {
        self.names.iter().fold(base.to_path_buf(), |p, n| p.join(n))
    }

    pub fn label(&self) -> String {
        self.names.join(",")
    }
}

/// The non-anti node of one family.
///
/// The range only ever narrows. Once a concrete version is pinned the node
/// carries its metadata and, after variant reduction, its root path.
#[derive(Debug, Clone)]
pub struct PackageNode {
    pub family: String,
    pub range: VersionRange,
    /// Concrete version chosen from the repository.
    pub package: Option<PackageVersion>,
    pub metadata: Option<Arc<PackageMetadata>>,
    /// `None` when the pinned version declares no variants.
    pub variants: Option<Vec<PackageVariant>>,
    pub root_path: Option<PathBuf>,
    /// Transitive inference already ran on this node.
    pub transitive_checked: bool,
    /// Introduced by transitive inference rather than by a real request.
    pub inferred: bool,
}

impl PackageNode {
    pub fn new(family: impl Into<String>, range: VersionRange) -> Self {
        Self {
            family: family.into(),
            range,
            package: None,
            metadata: None,
            variants: None,
            root_path: None,
            transitive_checked: false,
            inferred: false,
        }
    }

    /// The same node with a narrower range.
    pub fn narrowed(&self, range: VersionRange) -> Self {
        Self {
            range,
            ..self.clone()
        }
    }

    pub fn version(&self) -> Option<&Version> {
        self.package.as_ref().map(|p| &p.version)
    }

    pub fn is_pinned(&self) -> bool {
        self.package.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.root_path.is_some()
    }

    /// Variants still in play, if any were declared.
    pub fn variant_count(&self) -> usize {
        self.variants.as_ref().map_or(0, Vec::len)
    }

    /// The request this node currently stands for.
    pub fn request(&self) -> PackageRequest {
        match self.version() {
            Some(v) => PackageRequest::exact(self.family.clone(), v.clone()),
            None => PackageRequest::require(self.family.clone(), self.range.clone()),
        }
    }

    /// `family-version` once pinned, the request text otherwise.
    pub fn label(&self) -> String {
        match self.version() {
            Some(v) => format!("{}-{v}", self.family),
            None => self.request().short_name(),
        }
    }
}

// Nodes compare by what request classification decides, not resolve state.
impl PartialEq for PackageNode {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family
            && self.range == other.range
            && self.version() == other.version()
    }
}
