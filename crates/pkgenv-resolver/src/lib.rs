//! Configuration resolver: turns package requests into one exact version per
//! family, resolving build variants and rejecting conflicts and cycles.

pub mod cache;
pub mod configuration;
pub mod conflict;
pub mod graph;
pub mod package;
pub mod resolver;

pub use conflict::ResolveError;
pub use resolver::{ResolveOptions, ResolveResult, Resolver};
