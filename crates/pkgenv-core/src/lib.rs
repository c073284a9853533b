//! Core data types for pkgenv.
//!
//! This crate defines the vocabulary shared by the repository, resolver and
//! CLI crates: versions and the interval algebra over them, package
//! requests, metadata resources, resolved packages and global configuration.
//!
//! This crate is intentionally free of repository access and resolution logic.

/// Family name of the implicit platform package.
pub const PLATFORM_FAMILY: &str = "platform";

pub mod config;
pub mod metadata;
pub mod request;
pub mod resolved;
pub mod version;
