//! Shared utilities for pkgenv.
//!
//! This crate provides cross-cutting concerns used by all other pkgenv crates:
//! error types, filesystem helpers and hashing for cache keys.

pub mod errors;
pub mod fs;
pub mod hash;
