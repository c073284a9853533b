//! Resolve failures and conflict reporting.

use std::fmt;

use miette::Diagnostic;
use pkgenv_core::request::{PackageRequest, RequestError};
use pkgenv_repository::RepositoryError;
use thiserror::Error;

use crate::graph::ProvenanceGraph;

/// A pair of requests that cannot both hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConflict {
    /// What the configuration already held.
    pub existing: PackageRequest,
    /// The request that was rejected.
    pub request: PackageRequest,
}

impl fmt::Display for RequestConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <--!--> {}", self.existing, self.request)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("Package family `{family}` not found")]
    #[diagnostic(help("Check the repository search roots in ~/.pkgenv/config.toml"))]
    FamilyNotFound { family: String },

    #[error("Package not found: {request} ({reason})")]
    VersionNotFound { request: String, reason: String },

    #[error("Conflicting requests: {}", join(.conflicts))]
    #[diagnostic(help("Write the provenance graph with --dot to see where each request came from"))]
    Conflict {
        conflicts: Vec<RequestConflict>,
        graph: Box<ProvenanceGraph>,
    },

    #[error("Unresolved requests: {}", .requests.join(", "))]
    #[diagnostic(help(
        "Make these requests exact, or use resolve mode `latest` or `earliest`"
    ))]
    Unresolved { requests: Vec<String> },

    #[error("Configuration could not be resolved after {} failed attempts", .failures.len())]
    ConfigNotResolved {
        failures: Vec<String>,
        graph: Box<ProvenanceGraph>,
    },

    #[error("Gave up after {} failed attempts (max-fails = {max_fails})", .failures.len())]
    #[diagnostic(help("Raise max-fails or constrain the requests further"))]
    MaxFailsExceeded {
        max_fails: usize,
        failures: Vec<String>,
        graph: Box<ProvenanceGraph>,
    },

    #[error("Cyclic dependency: {}", join_edges(.edges))]
    CyclicDependency {
        edges: Vec<(String, String)>,
        graph: Box<ProvenanceGraph>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("Resolve cache error: {message}")]
    Cache { message: String },
}

fn join(conflicts: &[RequestConflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_edges(edges: &[(String, String)]) -> String {
    edges
        .iter()
        .map(|(a, b)| format!("{a} -> {b}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ResolveError {
    /// Whether a failed candidate with this error may be skipped in favour of
    /// the next one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolveError::FamilyNotFound { .. }
                | ResolveError::VersionNotFound { .. }
                | ResolveError::Conflict { .. }
                | ResolveError::Unresolved { .. }
                | ResolveError::ConfigNotResolved { .. }
                | ResolveError::CyclicDependency { .. }
        )
    }

    /// The provenance graph captured when the failure happened.
    pub fn graph(&self) -> Option<&ProvenanceGraph> {
        match self {
            ResolveError::Conflict { graph, .. }
            | ResolveError::ConfigNotResolved { graph, .. }
            | ResolveError::MaxFailsExceeded { graph, .. }
            | ResolveError::CyclicDependency { graph, .. } => Some(&**graph),
            _ => None,
        }
    }
}
