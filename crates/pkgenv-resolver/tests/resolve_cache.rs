use std::sync::Arc;

use pkgenv_core::metadata::PackageMetadata;
use pkgenv_core::request::parse_requests;
use pkgenv_repository::cache::{DirStore, MemoryStore};
use pkgenv_repository::memory::MemoryRepository;
use pkgenv_resolver::cache::ResolveCache;
use pkgenv_resolver::{ResolveOptions, Resolver};
use tempfile::TempDir;

fn repo() -> MemoryRepository {
    let repo = MemoryRepository::new();
    repo.add(
        "maya",
        "2012",
        10,
        PackageMetadata {
            requires: vec!["python-2.6".to_string()],
            ..PackageMetadata::default()
        },
    )
    .unwrap();
    repo.add("python", "2.6", 10, PackageMetadata::default()).unwrap();
    repo
}

fn options(epoch: u64) -> ResolveOptions {
    ResolveOptions {
        no_platform: true,
        epoch: Some(epoch),
        ..ResolveOptions::default()
    }
}

#[test]
fn second_resolve_is_served_without_repository_queries() {
    let repo = repo();
    let store = Arc::new(MemoryStore::new());
    let requests = parse_requests(&["maya"]).unwrap();

    let first = Resolver::new(&repo, options(100))
        .with_cache(ResolveCache::new(store.clone()))
        .resolve(&requests)
        .unwrap();
    assert!(!first.from_cache);
    assert_eq!(store.len(), 1);

    let versions = repo.version_queries();
    let metadata = repo.metadata_queries();
    let second = Resolver::new(&repo, options(200))
        .with_cache(ResolveCache::new(store))
        .resolve(&requests)
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.packages, first.packages);
    assert_eq!(repo.version_queries(), versions);
    assert_eq!(repo.metadata_queries(), metadata);
    assert!(second.graph.contains("maya-2012"));
}

#[test]
fn new_release_invalidates_cached_resolve() {
    let repo = repo();
    let store = Arc::new(MemoryStore::new());
    let requests = parse_requests(&["python"]).unwrap();

    Resolver::new(&repo, options(100))
        .with_cache(ResolveCache::new(store.clone()))
        .resolve(&requests)
        .unwrap();

    repo.add("python", "2.7", 150, PackageMetadata::default()).unwrap();
    let result = Resolver::new(&repo, options(200))
        .with_cache(ResolveCache::new(store))
        .resolve(&requests)
        .unwrap();
    assert!(!result.from_cache);
    assert_eq!(result.packages[0].short_name(), "python-2.7");
}

#[test]
fn different_options_do_not_share_entries() {
    let repo = repo();
    let store = Arc::new(MemoryStore::new());
    let requests = parse_requests(&["python"]).unwrap();

    Resolver::new(&repo, options(100))
        .with_cache(ResolveCache::new(store.clone()))
        .resolve(&requests)
        .unwrap();
    let earliest = ResolveOptions {
        mode: pkgenv_core::config::ResolveMode::Earliest,
        ..options(100)
    };
    let result = Resolver::new(&repo, earliest)
        .with_cache(ResolveCache::new(store.clone()))
        .resolve(&requests)
        .unwrap();
    assert!(!result.from_cache);
    assert_eq!(store.len(), 2);
}

#[test]
fn local_resolves_are_not_cached() {
    let repo = repo();
    repo.add_local("python", "2.6", PackageMetadata::default()).unwrap();
    let store = Arc::new(MemoryStore::new());

    let result = Resolver::new(&repo, options(100))
        .with_cache(ResolveCache::new(store.clone()))
        .resolve(&parse_requests(&["maya"]).unwrap())
        .unwrap();
    assert!(result.packages.iter().any(|p| p.local));
    assert!(store.is_empty());
}

#[test]
fn local_addition_invalidates_cached_resolve() {
    let repo = MemoryRepository::new();
    repo.add("foo", "1", 10, PackageMetadata::default()).unwrap();
    let store = Arc::new(MemoryStore::new());
    let requests = parse_requests(&["foo"]).unwrap();

    let first = Resolver::new(&repo, options(1_000))
        .with_cache(ResolveCache::new(store.clone()))
        .resolve(&requests)
        .unwrap();
    assert_eq!(first.packages[0].short_name(), "foo-1");

    repo.add_local("foo", "2", PackageMetadata::default()).unwrap();
    let second = Resolver::new(&repo, options(1_000))
        .with_cache(ResolveCache::new(store))
        .resolve(&requests)
        .unwrap();
    assert!(!second.from_cache);
    assert_eq!(second.packages[0].short_name(), "foo-2");
    assert!(second.packages[0].local);
}

#[test]
fn directory_store_is_shared_between_resolvers() {
    let tmp = TempDir::new().unwrap();
    let repo = repo();
    let requests = parse_requests(&["maya"]).unwrap();

    let store = Arc::new(DirStore::new(tmp.path()).unwrap());
    Resolver::new(&repo, options(100))
        .with_cache(ResolveCache::new(store))
        .resolve(&requests)
        .unwrap();

    let reopened = Arc::new(DirStore::new(tmp.path()).unwrap());
    let result = Resolver::new(&repo, options(100))
        .with_cache(ResolveCache::new(reopened))
        .resolve(&requests)
        .unwrap();
    assert!(result.from_cache);
}
