//! Package repository access: version discovery under search roots,
//! metadata resources, the metadata cache and check-and-set cache stores.

pub mod cache;
pub mod filesystem;
pub mod memory;
pub mod repository;

pub use repository::{PackageVersion, Repository, RepositoryError};
