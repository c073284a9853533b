//! Resolver entry point: platform injection, the resolve cache, and the
//! top-level configuration run.

use std::collections::HashSet;

use pkgenv_core::config::{ResolveConfig, ResolveMode};
use pkgenv_core::request::{PackageRequest, RequestError};
use pkgenv_core::resolved::ResolvedPackage;
use pkgenv_core::version::{Version, VersionRange};
use pkgenv_core::PLATFORM_FAMILY;
use pkgenv_repository::Repository;

use crate::cache::ResolveCache;
use crate::configuration::{Configuration, ResolveContext};
use crate::conflict::ResolveError;
use crate::graph::{EdgeKind, ProvenanceGraph, ROOT_LABEL};

/// Knobs for a single resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub mode: ResolveMode,
    /// Abort after this many rejected candidates; unlimited when `None`.
    pub max_fails: Option<usize>,
    /// Infer requirements shared by the earliest and latest candidates.
    pub assume_transitive: bool,
    /// Add build-only requirements of directly requested packages.
    pub build_requires: bool,
    /// Skip the implicit `platform-<os>` request.
    pub no_platform: bool,
    pub platform: String,
    /// Ignore packages published after this time (epoch seconds); now when
    /// `None`.
    pub epoch: Option<u64>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_config(&ResolveConfig::default())
    }
}

impl ResolveOptions {
    pub fn from_config(config: &ResolveConfig) -> Self {
        Self {
            mode: config.mode,
            max_fails: config.max_fails,
            assume_transitive: config.assume_transitive,
            build_requires: false,
            no_platform: false,
            platform: config.platform(),
            epoch: None,
        }
    }

    /// The implicit platform request, unless suppressed.
    pub fn platform_request(&self) -> Result<Option<PackageRequest>, RequestError> {
        if self.no_platform {
            return Ok(None);
        }
        let version = Version::parse(&self.platform).map_err(|source| RequestError::Version {
            input: format!("{PLATFORM_FAMILY}-{}", self.platform),
            source,
        })?;
        Ok(Some(PackageRequest::require(
            PLATFORM_FAMILY,
            VersionRange::exact(version),
        )))
    }
}

/// A successful resolve.
#[derive(Debug, Clone)]
pub struct ResolveResult {
    /// Dependencies before dependents.
    pub packages: Vec<ResolvedPackage>,
    pub graph: ProvenanceGraph,
    /// Candidate versions rejected along the way.
    pub num_fails: usize,
    /// Served from the resolve cache without touching the repository.
    pub from_cache: bool,
}

pub struct Resolver<'a> {
    repo: &'a dyn Repository,
    options: ResolveOptions,
    cache: Option<ResolveCache>,
}

impl<'a> Resolver<'a> {
    pub fn new(repo: &'a dyn Repository, options: ResolveOptions) -> Self {
        Self {
            repo,
            options,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ResolveCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve `requests` into an ordered, conflict-free package list.
    pub fn resolve(&self, requests: &[PackageRequest]) -> Result<ResolveResult, ResolveError> {
        let epoch = self
            .options
            .epoch
            .unwrap_or_else(pkgenv_util::fs::now_secs);

        let mut all = Vec::with_capacity(requests.len() + 1);
        if let Some(platform) = self.options.platform_request()? {
            all.push(platform);
        }
        all.extend(requests.iter().cloned());

        let key = self
            .cache
            .as_ref()
            .map(|_| ResolveCache::key(&self.repo.cache_roots(), &self.options, &all));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(packages) = cache.lookup(key, epoch, self.repo) {
                tracing::info!("Resolve served from cache ({} packages)", packages.len());
                return Ok(ResolveResult {
                    graph: cached_graph(&all, &packages),
                    packages,
                    num_fails: 0,
                    from_cache: true,
                });
            }
        }

        tracing::debug!(
            "Resolving [{}] in {} mode at epoch {epoch}",
            all.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "),
            self.options.mode
        );

        let top_level: HashSet<String> = all
            .iter()
            .filter(|r| !r.is_anti())
            .map(|r| r.family.clone())
            .collect();
        let mut ctx = ResolveContext::new(self.repo, &self.options, epoch).with_top_level(top_level);

        let mut config = Configuration::new();
        for request in &all {
            config.add_request(request, ROOT_LABEL, EdgeKind::Requires, &mut ctx)?;
        }
        config.resolve_packages(&mut ctx)?;
        let packages = config.resolved_packages()?;

        tracing::info!(
            "Resolved {} packages ({} failed attempts)",
            packages.len(),
            ctx.num_fails()
        );

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Err(e) = cache.store(key, &packages) {
                tracing::warn!("Failed to store resolve in cache: {e}");
            }
        }

        Ok(ResolveResult {
            packages,
            graph: config.into_graph(),
            num_fails: ctx.num_fails(),
            from_cache: false,
        })
    }
}

/// A flat graph for results that never went through a configuration.
fn cached_graph(requests: &[PackageRequest], packages: &[ResolvedPackage]) -> ProvenanceGraph {
    let mut graph = ProvenanceGraph::new();
    for request in requests {
        graph.link(ROOT_LABEL, &request.to_string(), EdgeKind::Requires);
    }
    for package in packages {
        let resolved = package.short_name();
        match requests.iter().find(|r| !r.is_anti() && r.family == package.name) {
            Some(request) => graph.link(&request.to_string(), &resolved, EdgeKind::Resolve),
            None => graph.link(ROOT_LABEL, &resolved, EdgeKind::Requires),
        }
    }
    graph
}
