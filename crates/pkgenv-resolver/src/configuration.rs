//! The resolver proper.
//!
//! A [`Configuration`] holds at most one non-anti node and one anti request
//! per family. Requests are classified before any mutation, so a
//! configuration is never left half-conflicting. Resolution alternates a
//! settling pass that needs no version choices (pin exact ranges, prune and
//! hoist variants, confirm paths) with progressively more speculative steps:
//! transitive inference, then trying candidate versions on copies of the
//! configuration, then dropping the least suitable variant.
//!
//! Nodes sit behind `Arc` so copying a configuration for a candidate only
//! bumps reference counts; a node is cloned when it is first changed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pkgenv_core::config::ResolveMode;
use pkgenv_core::metadata::PackageMetadata;
use pkgenv_core::request::{PackageRequest, RequestKind};
use pkgenv_core::resolved::ResolvedPackage;
use pkgenv_core::version::VersionRange;
use pkgenv_repository::{PackageVersion, Repository};

use crate::conflict::{RequestConflict, ResolveError};
use crate::graph::{EdgeKind, ProvenanceGraph, ROOT_LABEL};
use crate::package::{PackageNode, PackageVariant};
use crate::resolver::ResolveOptions;

/// What adding a request to a configuration would do.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEffect {
    /// The request contradicts what the configuration already holds.
    Conflict(PackageRequest),
    /// The request is already implied.
    NoEffect,
    /// The request changes the configuration.
    Add(Addition),
}

/// The replacement to install for a request's family.
#[derive(Debug, Clone, PartialEq)]
pub enum Addition {
    Node(PackageNode),
    Anti(PackageRequest),
}

/// State shared by every configuration copy of one resolve.
pub struct ResolveContext<'a> {
    repo: &'a dyn Repository,
    options: &'a ResolveOptions,
    epoch: u64,
    /// Families requested directly; only these get build requirements.
    top_level: HashSet<String>,
    /// Versions published at or before the epoch, ascending.
    versions: HashMap<String, Arc<Vec<PackageVersion>>>,
    num_fails: usize,
    failures: Vec<String>,
    last_graph: Option<ProvenanceGraph>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(repo: &'a dyn Repository, options: &'a ResolveOptions, epoch: u64) -> Self {
        Self {
            repo,
            options,
            epoch,
            top_level: HashSet::new(),
            versions: HashMap::new(),
            num_fails: 0,
            failures: Vec::new(),
            last_graph: None,
        }
    }

    pub fn with_top_level(mut self, families: HashSet<String>) -> Self {
        self.top_level = families;
        self
    }

    pub fn num_fails(&self) -> usize {
        self.num_fails
    }

    fn versions(&mut self, family: &str) -> Result<Arc<Vec<PackageVersion>>, ResolveError> {
        if let Some(cached) = self.versions.get(family) {
            return Ok(Arc::clone(cached));
        }
        let epoch = self.epoch;
        let visible: Vec<PackageVersion> = self
            .repo
            .versions(family)?
            .into_iter()
            .filter(|p| p.timestamp <= epoch)
            .collect();
        let visible = Arc::new(visible);
        self.versions
            .insert(family.to_string(), Arc::clone(&visible));
        Ok(visible)
    }

    /// Visible versions of `family` inside `range`, ascending.
    fn versions_in(
        &mut self,
        family: &str,
        range: &VersionRange,
    ) -> Result<Vec<PackageVersion>, ResolveError> {
        Ok(self
            .versions(family)?
            .iter()
            .filter(|p| range.contains(&p.version))
            .cloned()
            .collect())
    }

    fn record_failure(&mut self, reason: String, graph: ProvenanceGraph) -> Result<(), ResolveError> {
        tracing::debug!("Rejected {reason}");
        self.num_fails += 1;
        self.failures.push(reason);
        match self.options.max_fails {
            Some(max_fails) if self.num_fails > max_fails => Err(ResolveError::MaxFailsExceeded {
                max_fails,
                failures: self.failures.clone(),
                graph: Box::new(graph),
            }),
            _ => {
                self.last_graph = Some(graph);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    nodes: HashMap<String, Arc<PackageNode>>,
    anti: HashMap<String, PackageRequest>,
    /// Non-anti families in the order they were first added.
    order: Vec<String>,
    graph: ProvenanceGraph,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration {
    pub fn new() -> Self {
        let mut graph = ProvenanceGraph::new();
        graph.add_node(ROOT_LABEL);
        Self {
            nodes: HashMap::new(),
            anti: HashMap::new(),
            order: Vec::new(),
            graph,
        }
    }

    pub fn node(&self, family: &str) -> Option<&PackageNode> {
        self.nodes.get(family).map(|n| n.as_ref())
    }

    pub fn anti(&self, family: &str) -> Option<&PackageRequest> {
        self.anti.get(family)
    }

    /// Non-anti families in insertion order.
    pub fn families(&self) -> &[String] {
        &self.order
    }

    pub fn graph(&self) -> &ProvenanceGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ProvenanceGraph {
        self.graph
    }

    /// True when every non-anti family has a confirmed install path.
    pub fn is_resolved(&self) -> bool {
        self.nodes.values().all(|n| n.is_resolved())
    }

    /// Labels of the nodes still lacking an install path.
    pub fn unresolved_requests(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|f| self.nodes.get(f))
            .filter(|n| !n.is_resolved())
            .map(|n| n.label())
            .collect()
    }

    /// Classify `request` against this configuration without changing it.
    pub fn test_pkg_req_add(&self, request: &PackageRequest) -> RequestEffect {
        let family = &request.family;
        match request.kind {
            RequestKind::Forbid => {
                if request.range.is_empty() {
                    return RequestEffect::NoEffect;
                }
                if let Some(node) = self.nodes.get(family) {
                    if let Some(version) = node.version() {
                        return if request.range.contains(version) {
                            RequestEffect::Conflict(node.request())
                        } else {
                            RequestEffect::NoEffect
                        };
                    }
                    if !node.range.intersects(&request.range) {
                        return RequestEffect::NoEffect;
                    }
                    let reduced = node.range.intersection(&request.range.inverse());
                    if reduced.is_empty() {
                        RequestEffect::Conflict(node.request())
                    } else {
                        RequestEffect::Add(Addition::Node(node.narrowed(reduced)))
                    }
                } else if let Some(anti) = self.anti.get(family) {
                    let merged = anti.range.union(&request.range);
                    if merged == anti.range {
                        RequestEffect::NoEffect
                    } else {
                        RequestEffect::Add(Addition::Anti(PackageRequest::forbid(
                            family.clone(),
                            merged,
                        )))
                    }
                } else {
                    RequestEffect::Add(Addition::Anti(request.clone()))
                }
            }
            RequestKind::Require => {
                if let Some(node) = self.nodes.get(family) {
                    if let Some(version) = node.version() {
                        return if request.range.contains(version) {
                            RequestEffect::NoEffect
                        } else {
                            RequestEffect::Conflict(node.request())
                        };
                    }
                    let common = node.range.intersection(&request.range);
                    if common.is_empty() {
                        RequestEffect::Conflict(node.request())
                    } else if common == node.range {
                        RequestEffect::NoEffect
                    } else {
                        RequestEffect::Add(Addition::Node(node.narrowed(common)))
                    }
                } else if let Some(anti) = self.anti.get(family) {
                    if !request.range.intersects(&anti.range) {
                        return RequestEffect::Add(Addition::Node(PackageNode::new(
                            family.clone(),
                            request.range.clone(),
                        )));
                    }
                    let allowed = request.range.intersection(&anti.range.inverse());
                    if allowed.is_empty() {
                        RequestEffect::Conflict(anti.clone())
                    } else {
                        RequestEffect::Add(Addition::Node(PackageNode::new(family.clone(), allowed)))
                    }
                } else {
                    RequestEffect::Add(Addition::Node(PackageNode::new(
                        family.clone(),
                        request.range.clone(),
                    )))
                }
            }
        }
    }

    /// Add `request`, required by the node labelled `parent`.
    ///
    /// Returns whether the configuration changed.
    pub fn add_request(
        &mut self,
        request: &PackageRequest,
        parent: &str,
        edge: EdgeKind,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<bool, ResolveError> {
        let label = request.to_string();
        self.graph.link(parent, &label, edge);

        match self.test_pkg_req_add(request) {
            RequestEffect::NoEffect => Ok(false),
            RequestEffect::Conflict(existing) => {
                self.graph
                    .link(&existing.to_string(), &label, EdgeKind::Conflict);
                Err(ResolveError::Conflict {
                    conflicts: vec![RequestConflict {
                        existing,
                        request: request.clone(),
                    }],
                    graph: Box::new(self.graph.clone()),
                })
            }
            RequestEffect::Add(Addition::Anti(anti)) => {
                let merged = anti.to_string();
                if let Some(previous) = self.anti.get(&request.family) {
                    self.graph
                        .link(&previous.to_string(), &merged, EdgeKind::Reduce);
                }
                self.graph.link(&label, &merged, EdgeKind::Reduce);
                self.anti.insert(request.family.clone(), anti);
                Ok(true)
            }
            RequestEffect::Add(Addition::Node(node)) => {
                self.check_available(&node, ctx)?;
                let family = node.family.clone();
                let narrowed = node.label();
                if let Some(previous) = self.nodes.get(&family) {
                    self.graph
                        .link(&previous.label(), &narrowed, EdgeKind::Reduce);
                } else {
                    self.order.push(family.clone());
                }
                if let Some(anti) = self.anti.remove(&family) {
                    self.graph
                        .link(&anti.to_string(), &narrowed, EdgeKind::Reduce);
                }
                self.graph.link(&label, &narrowed, EdgeKind::Reduce);
                tracing::debug!("Added {narrowed} (from {label})");
                self.nodes.insert(family, Arc::new(node));
                Ok(true)
            }
        }
    }

    /// A non-anti node must have at least one visible version.
    fn check_available(
        &self,
        node: &PackageNode,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<(), ResolveError> {
        if !ctx.versions_in(&node.family, &node.range)?.is_empty() {
            return Ok(());
        }
        if !ctx.repo.family_exists(&node.family)? {
            return Err(ResolveError::FamilyNotFound {
                family: node.family.clone(),
            });
        }
        Err(ResolveError::VersionNotFound {
            request: node.label(),
            reason: format!("no version published at or before epoch {}", ctx.epoch),
        })
    }

    /// Pin `family` to a concrete version, fetch its metadata and add its
    /// requirements.
    fn pin(
        &mut self,
        family: &str,
        package: PackageVersion,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<(), ResolveError> {
        let Some(current) = self.nodes.get(family) else {
            return Ok(());
        };
        let from = current.label();
        let label = format!("{family}-{}", package.version);

        let metadata = ctx.repo.metadata(family, &package)?.ok_or_else(|| {
            ResolveError::VersionNotFound {
                request: label.clone(),
                reason: format!("no metadata in {}", package.base_path.display()),
            }
        })?;

        let variants = if metadata.has_variants() {
            Some(PackageVariant::declared_by(&metadata)?)
        } else {
            if !ctx.repo.path_exists(&package.base_path) {
                return Err(ResolveError::VersionNotFound {
                    request: label,
                    reason: format!("{} does not exist", package.base_path.display()),
                });
            }
            None
        };

        let mut pinned = current.narrowed(
            current
                .range
                .intersection(&VersionRange::exact(package.version.clone())),
        );
        pinned.root_path = variants.is_none().then(|| package.base_path.clone());
        pinned.variants = variants;
        pinned.metadata = Some(Arc::clone(&metadata));
        pinned.package = Some(package);
        let inferred = pinned.inferred;
        self.nodes.insert(family.to_string(), Arc::new(pinned));
        self.graph.link(&from, &label, EdgeKind::Resolve);
        if inferred {
            self.graph.mark_inferred(&label);
        }
        tracing::debug!("Pinned {label}");

        let build = ctx.options.build_requires && ctx.top_level.contains(family);
        for requirement in metadata.requirements(build)? {
            self.add_request(&requirement, &label, EdgeKind::Requires, ctx)?;
        }
        Ok(())
    }

    /// Resolve until every family has an install path, then check for cycles.
    pub fn resolve_packages(&mut self, ctx: &mut ResolveContext<'_>) -> Result<(), ResolveError> {
        loop {
            self.settle(ctx)?;
            if self.is_resolved() {
                break;
            }

            let ambiguous = self.next_ambiguous_family();
            if ctx.options.mode == ResolveMode::None && ambiguous.is_some() {
                return Err(ResolveError::Unresolved {
                    requests: self.unresolved_requests(),
                });
            }

            if ctx.options.assume_transitive && self.infer_transitive(ctx)? {
                continue;
            }

            if let Some(family) = ambiguous {
                // A committed candidate comes back fully resolved and checked.
                return self.resolve_by_candidates(&family, ctx);
            }

            if self.remove_least_suitable_variant() {
                continue;
            }

            return Err(ResolveError::Unresolved {
                requests: self.unresolved_requests(),
            });
        }
        self.check_cycles()
    }

    /// Apply every step that needs no version choice until none applies.
    fn settle(&mut self, ctx: &mut ResolveContext<'_>) -> Result<(), ResolveError> {
        loop {
            let mut progressed = self.pin_exact(ctx)?;
            progressed |= self.prune_variants()?;
            progressed |= self.hoist_variant_requests(ctx)?;
            progressed |= self.confirm_variants(ctx)?;
            if !progressed {
                return Ok(());
            }
        }
    }

    /// Pin every unpinned node whose range is exact.
    ///
    /// A version equal to the exact bound wins; otherwise the mode picks
    /// among the versions the prefix covers.
    fn pin_exact(&mut self, ctx: &mut ResolveContext<'_>) -> Result<bool, ResolveError> {
        let mut progressed = false;
        for family in self.order.clone() {
            let Some(node) = self.nodes.get(&family) else {
                continue;
            };
            if node.is_pinned() {
                continue;
            }
            let Some(exact) = node.range.exact_version().cloned() else {
                continue;
            };
            let range = node.range.clone();
            let candidates = ctx.versions_in(&family, &range)?;
            let chosen = candidates
                .iter()
                .find(|p| p.version == exact)
                .or_else(|| match ctx.options.mode {
                    ResolveMode::Earliest => candidates.first(),
                    _ => candidates.last(),
                })
                .cloned();
            let Some(package) = chosen else {
                return Err(ResolveError::VersionNotFound {
                    request: format!("{family}-{range}"),
                    reason: "no matching version".to_string(),
                });
            };
            self.pin(&family, package, ctx)?;
            progressed = true;
        }
        Ok(progressed)
    }

    /// Drop variants that contradict the configuration. Every declared
    /// request counts, hoisted or not.
    fn prune_variants(&mut self) -> Result<bool, ResolveError> {
        let mut progressed = false;
        for family in self.order.clone() {
            let Some(node) = self.nodes.get(&family) else {
                continue;
            };
            let Some(variants) = node.variants.as_ref() else {
                continue;
            };
            if node.is_resolved() {
                continue;
            }

            let mut keep = Vec::with_capacity(variants.len());
            let mut conflicts = Vec::new();
            for variant in variants {
                let clash = variant.requests().iter().find_map(|r| {
                    match self.test_pkg_req_add(r) {
                        RequestEffect::Conflict(existing) => Some(RequestConflict {
                            existing,
                            request: r.clone(),
                        }),
                        _ => None,
                    }
                });
                match clash {
                    Some(conflict) => conflicts.push(conflict),
                    None => keep.push(variant.clone()),
                }
            }
            if conflicts.is_empty() {
                continue;
            }

            let label = node.label();
            for conflict in &conflicts {
                self.graph
                    .link(&label, &conflict.request.to_string(), EdgeKind::Conflict);
                self.graph.link(
                    &conflict.existing.to_string(),
                    &conflict.request.to_string(),
                    EdgeKind::Conflict,
                );
            }
            if keep.is_empty() {
                return Err(ResolveError::Conflict {
                    conflicts,
                    graph: Box::new(self.graph.clone()),
                });
            }
            tracing::debug!("{label}: {} variants left", keep.len());
            if let Some(node) = self.nodes.get_mut(&family) {
                Arc::make_mut(node).variants = Some(keep);
            }
            progressed = true;
        }
        Ok(progressed)
    }

    /// Move requests every remaining variant agrees on into the
    /// configuration.
    ///
    /// A family named (non-anti) by all variants is hoisted as the union of
    /// their ranges. A sole remaining variant hoists its whole working list.
    fn hoist_variant_requests(&mut self, ctx: &mut ResolveContext<'_>) -> Result<bool, ResolveError> {
        let mut progressed = false;
        for family in self.order.clone() {
            let Some(node) = self.nodes.get(&family) else {
                continue;
            };
            if node.is_resolved() {
                continue;
            }
            let Some(mut variants) = node.variants.clone() else {
                continue;
            };
            let label = node.label();

            let hoisted = if let [only] = variants.as_mut_slice() {
                only.take_working()
            } else {
                common_requests(&mut variants)
            };
            if hoisted.is_empty() {
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&family) {
                Arc::make_mut(node).variants = Some(variants);
            }
            for request in &hoisted {
                self.add_request(request, &label, EdgeKind::Variant, ctx)?;
            }
            progressed = true;
        }
        Ok(progressed)
    }

    /// Confirm the install path of packages down to one settled variant.
    fn confirm_variants(&mut self, ctx: &mut ResolveContext<'_>) -> Result<bool, ResolveError> {
        let mut progressed = false;
        for family in self.order.clone() {
            let Some(node) = self.nodes.get(&family) else {
                continue;
            };
            if node.is_resolved() {
                continue;
            }
            let (Some([variant]), Some(package)) = (node.variants.as_deref(), &node.package)
            else {
                continue;
            };
            if !variant.is_settled() {
                continue;
            }
            let path = variant.path(&package.base_path);
            if !ctx.repo.path_exists(&path) {
                return Err(ResolveError::VersionNotFound {
                    request: node.label(),
                    reason: format!("variant path {} does not exist", path.display()),
                });
            }
            tracing::debug!("{}: using variant {}", node.label(), variant.label());
            if let Some(node) = self.nodes.get_mut(&family) {
                Arc::make_mut(node).root_path = Some(path);
            }
            progressed = true;
        }
        Ok(progressed)
    }

    /// First family, in insertion order, that still needs a version choice.
    fn next_ambiguous_family(&self) -> Option<String> {
        self.order
            .iter()
            .find(|f| self.nodes.get(*f).is_some_and(|n| !n.is_pinned()))
            .cloned()
    }

    /// Assume requirements shared by the earliest and latest candidate of an
    /// unpinned node hold for every version in between.
    ///
    /// Runs at most once per node. Returns whether any node was examined.
    fn infer_transitive(&mut self, ctx: &mut ResolveContext<'_>) -> Result<bool, ResolveError> {
        let mut progressed = false;
        for family in self.order.clone() {
            let Some(node) = self.nodes.get(&family) else {
                continue;
            };
            if node.is_pinned() || node.transitive_checked {
                continue;
            }
            let range = node.range.clone();
            let label = node.label();
            if let Some(node) = self.nodes.get_mut(&family) {
                Arc::make_mut(node).transitive_checked = true;
            }
            progressed = true;

            let candidates = ctx.versions_in(&family, &range)?;
            let (Some(earliest), Some(latest)) = (candidates.first(), candidates.last()) else {
                continue;
            };
            let (Some(early), Some(late)) = (
                ctx.repo.metadata(&family, earliest)?,
                ctx.repo.metadata(&family, latest)?,
            ) else {
                continue;
            };
            let early = guaranteed_requirements(&early)?;
            let late = guaranteed_requirements(&late)?;

            for (dependency, early_range) in &early {
                if *dependency == family {
                    continue;
                }
                let Some((_, late_range)) = late.iter().find(|(f, _)| f == dependency) else {
                    continue;
                };
                let spanned = early_range.span(late_range);
                if spanned.is_empty() {
                    continue;
                }
                let request = PackageRequest::require(dependency.clone(), spanned);
                let fresh = !self.nodes.contains_key(dependency);
                if self.add_request(&request, &label, EdgeKind::Transitive, ctx)? && fresh {
                    if let Some(node) = self.nodes.get_mut(dependency) {
                        Arc::make_mut(node).inferred = true;
                        self.graph.mark_inferred(&node.label());
                    }
                }
            }
        }
        Ok(progressed)
    }

    /// Try each candidate version of `family` on a copy of this
    /// configuration and commit the first that resolves completely.
    fn resolve_by_candidates(
        &mut self,
        family: &str,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<(), ResolveError> {
        let Some(node) = self.nodes.get(family) else {
            return Ok(());
        };
        let label = node.label();
        let mut candidates = ctx.versions_in(family, &node.range)?;
        if candidates.is_empty() {
            return Err(ResolveError::VersionNotFound {
                request: label,
                reason: "no candidate versions".to_string(),
            });
        }
        if ctx.options.mode != ResolveMode::Earliest {
            candidates.reverse();
        }

        for package in candidates {
            let name = format!("{family}-{}", package.version);
            tracing::debug!("Trying {name} for {label}");
            let mut attempt = self.clone();
            let outcome = match attempt.pin(family, package, ctx) {
                Ok(()) => attempt.resolve_packages(ctx),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => {
                    *self = attempt;
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    let graph = e.graph().cloned().unwrap_or_else(|| attempt.graph.clone());
                    ctx.record_failure(format!("{name}: {e}"), graph)?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ResolveError::ConfigNotResolved {
            failures: ctx.failures.clone(),
            graph: Box::new(
                ctx.last_graph
                    .clone()
                    .unwrap_or_else(|| self.graph.clone()),
            ),
        })
    }

    /// Delete the one variant whose families are most foreign to the
    /// configuration.
    ///
    /// Ties go to the earliest package in insertion order and, within a
    /// package, to the later-declared variant. The deletion is final.
    fn remove_least_suitable_variant(&mut self) -> bool {
        let mut best: Option<(usize, &String, usize)> = None;
        for family in &self.order {
            let Some(node) = self.nodes.get(family) else {
                continue;
            };
            if node.is_resolved() || node.variant_count() < 2 {
                continue;
            }
            let Some(variants) = node.variants.as_ref() else {
                continue;
            };
            for (index, variant) in variants.iter().enumerate().rev() {
                let foreign = variant
                    .families()
                    .iter()
                    .filter(|f| !self.nodes.contains_key(**f) && !self.anti.contains_key(**f))
                    .count();
                if best.map_or(true, |(score, _, _)| foreign > score) {
                    best = Some((foreign, family, index));
                }
            }
        }
        let Some((_, family, index)) = best else {
            return false;
        };
        let family = family.clone();

        if let Some(node) = self.nodes.get_mut(&family) {
            let label = node.label();
            if let Some(variants) = Arc::make_mut(node).variants.as_mut() {
                let removed = variants.remove(index);
                tracing::debug!("{label}: dropped least suitable variant {}", removed.label());
            }
        }
        true
    }

    /// Fail if the family-level dependency edges contain a cycle.
    ///
    /// Source-only and sink-only families are stripped until nothing changes;
    /// whatever edges remain lie on cycles.
    fn check_cycles(&mut self) -> Result<(), ResolveError> {
        let mut edges = self.dependency_edges();
        loop {
            let snapshot = edges.clone();
            edges.retain(|(from, to)| {
                snapshot.iter().any(|(_, t)| t == from) && snapshot.iter().any(|(f, _)| f == to)
            });
            if edges.len() == snapshot.len() {
                break;
            }
        }
        if edges.is_empty() {
            return Ok(());
        }

        for (from, to) in &edges {
            if let (Some(a), Some(b)) = (self.nodes.get(from), self.nodes.get(to)) {
                let (a, b) = (a.label(), b.label());
                self.graph.link(&a, &b, EdgeKind::Cyclic);
            }
        }
        Err(ResolveError::CyclicDependency {
            edges,
            graph: Box::new(self.graph.clone()),
        })
    }

    /// Family-level dependency edges between families of this configuration.
    fn dependency_edges(&self) -> Vec<(String, String)> {
        self.graph
            .family_dependencies()
            .into_iter()
            .filter(|(from, to)| self.nodes.contains_key(from) && self.nodes.contains_key(to))
            .collect()
    }

    /// Families ordered dependencies first.
    ///
    /// Each round emits, in insertion order, every family whose dependencies
    /// are all emitted, so independent families keep request order.
    pub fn ordered_families(&self) -> Vec<String> {
        let edges = self.dependency_edges();
        let mut done: HashSet<&str> = HashSet::new();
        let mut out: Vec<String> = Vec::with_capacity(self.order.len());
        while out.len() < self.order.len() {
            let ready: Vec<&String> = self
                .order
                .iter()
                .filter(|f| !done.contains(f.as_str()))
                .filter(|f| {
                    edges
                        .iter()
                        .all(|(from, to)| from != *f || done.contains(to.as_str()))
                })
                .collect();
            if ready.is_empty() {
                // Only reachable with a cycle; keep the rest in request order.
                out.extend(
                    self.order
                        .iter()
                        .filter(|f| !done.contains(f.as_str()))
                        .cloned(),
                );
                break;
            }
            for family in ready {
                done.insert(family);
                out.push(family.clone());
            }
        }
        out
    }

    /// The resolved packages, dependencies first.
    pub fn resolved_packages(&self) -> Result<Vec<ResolvedPackage>, ResolveError> {
        self.ordered_families()
            .iter()
            .map(|family| {
                let node = self.nodes.get(family);
                let parts = node.and_then(|n| {
                    Some((
                        n.package.as_ref()?,
                        n.metadata.as_ref()?,
                        n.root_path.as_ref()?,
                    ))
                });
                let Some((package, metadata, root_path)) = parts else {
                    return Err(ResolveError::Unresolved {
                        requests: vec![node.map_or_else(|| family.clone(), |n| n.label())],
                    });
                };
                Ok(ResolvedPackage {
                    name: family.clone(),
                    version: package.version.clone(),
                    base_path: package.base_path.clone(),
                    root_path: root_path.clone(),
                    commands: metadata.commands.clone(),
                    metadata: PackageMetadata::clone(metadata),
                    timestamp: package.timestamp,
                    local: package.local,
                })
            })
            .collect()
    }
}

/// Hoist families every variant names with a non-anti working request,
/// stripping them from each working list.
fn common_requests(variants: &mut [PackageVariant]) -> Vec<PackageRequest> {
    let Some(first) = variants.first() else {
        return Vec::new();
    };
    let mut families: Vec<String> = Vec::new();
    for request in first.working() {
        if !request.is_anti() && !families.contains(&request.family) {
            families.push(request.family.clone());
        }
    }

    let mut hoisted = Vec::new();
    for family in families {
        let ranges: Option<Vec<VersionRange>> =
            variants.iter().map(|v| v.working_range(&family)).collect();
        let Some(union) = ranges.and_then(|r| r.into_iter().reduce(|a, b| a.union(&b))) else {
            continue;
        };
        for variant in variants.iter_mut() {
            variant.strip(&family);
        }
        hoisted.push(PackageRequest::require(family, union));
    }
    hoisted
}

/// Non-anti requirements a version imposes whatever variant is chosen:
/// its runtime requirements plus families named by every variant.
fn guaranteed_requirements(
    metadata: &PackageMetadata,
) -> Result<Vec<(String, VersionRange)>, ResolveError> {
    let mut out: Vec<(String, VersionRange)> = Vec::new();
    let mut merge = |family: &str, range: &VersionRange| {
        match out.iter_mut().find(|(f, _)| f == family) {
            Some((_, existing)) => *existing = existing.intersection(range),
            None => out.push((family.to_string(), range.clone())),
        }
    };

    for request in metadata.requirements(false)? {
        if !request.is_anti() {
            merge(&request.family, &request.range);
        }
    }

    let mut variants = PackageVariant::declared_by(metadata)?;
    for request in common_requests(&mut variants) {
        merge(&request.family, &request.range);
    }
    Ok(out)
}
