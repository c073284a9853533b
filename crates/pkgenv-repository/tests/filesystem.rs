use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgenv_core::metadata::METADATA_FILE;
use pkgenv_core::version::Version;
use pkgenv_repository::cache::{CacheStore, MemoryStore};
use pkgenv_repository::filesystem::{FsRepository, TIMESTAMP_FILE};
use pkgenv_repository::{Repository, RepositoryError};
use tempfile::TempDir;

fn publish(root: &Path, family: &str, version: &str, content: &str, timestamp: Option<u64>) -> PathBuf {
    let dir = root.join(family).join(version);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(METADATA_FILE), content).unwrap();
    if let Some(ts) = timestamp {
        fs::write(dir.join(TIMESTAMP_FILE), ts.to_string()).unwrap();
    }
    dir
}

fn versions(repo: &FsRepository, family: &str) -> Vec<String> {
    repo.versions(family)
        .unwrap()
        .iter()
        .map(|p| p.version.to_string())
        .collect()
}

#[test]
fn versions_are_sorted_across_roots() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    publish(a.path(), "python", "2.6", "", Some(10));
    publish(a.path(), "python", "2.10", "", Some(10));
    publish(b.path(), "python", "2.7", "", Some(10));

    let repo = FsRepository::new(vec![a.path().to_path_buf(), b.path().to_path_buf()], None);
    assert_eq!(versions(&repo, "python"), vec!["2.6", "2.7", "2.10"]);
    assert!(repo.family_exists("python").unwrap());
    assert!(!repo.family_exists("maya").unwrap());
    assert!(repo.versions("maya").unwrap().is_empty());
}

#[test]
fn first_root_wins_for_duplicate_versions() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let first = publish(a.path(), "foo", "1.0", "", Some(10));
    publish(b.path(), "foo", "1.0", "", Some(20));

    let repo = FsRepository::new(vec![a.path().to_path_buf(), b.path().to_path_buf()], None);
    let found = repo.versions("foo").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].base_path, first);
    assert_eq!(found[0].timestamp, 10);
}

#[test]
fn local_root_shadows_and_is_timeless() {
    let local = TempDir::new().unwrap();
    let central = TempDir::new().unwrap();
    publish(central.path(), "foo", "1.0", "", Some(10));
    let dev = publish(local.path(), "foo", "1.0", "", Some(99));

    let repo = FsRepository::new(
        vec![central.path().to_path_buf()],
        Some(local.path().to_path_buf()),
    );
    let found = repo.versions("foo").unwrap();
    assert_eq!(found[0].base_path, dev);
    assert!(found[0].local);
    assert_eq!(found[0].timestamp, 0);
    // Only published roots key the resolve cache.
    assert_eq!(repo.cache_roots(), vec![central.path().to_path_buf()]);
}

#[test]
fn malformed_timestamp_falls_back_to_mtime() {
    let root = TempDir::new().unwrap();
    let dir = publish(root.path(), "foo", "1.0", "", None);
    fs::write(dir.join(TIMESTAMP_FILE), "yesterday").unwrap();

    let repo = FsRepository::new(vec![root.path().to_path_buf()], None);
    let found = repo.versions("foo").unwrap();
    assert!(found[0].timestamp > 0);
    assert!(found[0].timestamp <= pkgenv_util::fs::now_secs() + 1);
}

#[test]
fn invalid_version_directories_are_skipped() {
    let root = TempDir::new().unwrap();
    publish(root.path(), "foo", "1.0", "", Some(10));
    fs::create_dir_all(root.path().join("foo").join("not a version")).unwrap();
    fs::write(root.path().join("foo").join("README"), "").unwrap();

    let repo = FsRepository::new(vec![root.path().to_path_buf()], None);
    assert_eq!(versions(&repo, "foo"), vec!["1.0"]);
}

#[test]
fn metadata_is_parsed_and_missing_resource_is_none() {
    let root = TempDir::new().unwrap();
    publish(
        root.path(),
        "maya",
        "2012",
        r#"requires = ["python-2.6"]
variants = [["linux"], ["windows"]]
"#,
        Some(10),
    );
    let bare = root.path().join("maya").join("2013");
    fs::create_dir_all(&bare).unwrap();

    let repo = FsRepository::new(vec![root.path().to_path_buf()], None);
    let found = repo.versions("maya").unwrap();
    let meta = repo.metadata("maya", &found[0]).unwrap().unwrap();
    assert_eq!(meta.requires, vec!["python-2.6"]);
    assert!(meta.has_variants());
    assert_eq!(found[1].version, Version::parse("2013").unwrap());
    assert!(repo.metadata("maya", &found[1]).unwrap().is_none());
}

#[test]
fn broken_metadata_is_an_error() {
    let root = TempDir::new().unwrap();
    publish(root.path(), "foo", "1.0", "requires = [", Some(10));
    let repo = FsRepository::new(vec![root.path().to_path_buf()], None);
    let found = repo.versions("foo").unwrap();
    let err = repo.metadata("foo", &found[0]).unwrap_err();
    assert!(matches!(err, RepositoryError::Metadata { .. }));
}

#[test]
fn parsed_metadata_is_written_to_the_store() {
    let root = TempDir::new().unwrap();
    publish(root.path(), "foo", "1.0", r#"commands = ["echo hi"]"#, Some(10));
    let store = Arc::new(MemoryStore::new());

    let repo = FsRepository::new(vec![root.path().to_path_buf()], None).with_store(store.clone());
    let found = repo.versions("foo").unwrap();
    repo.metadata("foo", &found[0]).unwrap();
    assert_eq!(store.len(), 1);

    // A second repository reads the same entry back.
    let other = FsRepository::new(vec![root.path().to_path_buf()], None).with_store(store.clone());
    let meta = other.metadata("foo", &found[0]).unwrap().unwrap();
    assert_eq!(meta.commands, vec!["echo hi"]);
    let key = format!("metadata:{}", found[0].base_path.join(METADATA_FILE).display());
    assert!(store.get(&key).unwrap().is_some());
}

#[test]
fn local_metadata_is_not_written_to_the_store() {
    let local = TempDir::new().unwrap();
    let central = TempDir::new().unwrap();
    publish(local.path(), "foo", "1.0", r#"commands = ["echo dev"]"#, None);
    let store = Arc::new(MemoryStore::new());

    let repo = FsRepository::new(
        vec![central.path().to_path_buf()],
        Some(local.path().to_path_buf()),
    )
    .with_store(store.clone());
    let found = repo.versions("foo").unwrap();
    assert!(found[0].local);
    let meta = repo.metadata("foo", &found[0]).unwrap().unwrap();
    assert_eq!(meta.commands, vec!["echo dev"]);
    assert!(store.is_empty());
}

#[test]
fn paths_exist_only_on_disk() {
    let root = TempDir::new().unwrap();
    let dir = publish(root.path(), "foo", "1.0", "", Some(10));
    let repo = FsRepository::new(vec![root.path().to_path_buf()], None);
    assert!(repo.path_exists(&dir));
    assert!(!repo.path_exists(&dir.join("python-2.6")));
}

#[test]
fn family_modifications_are_detected() {
    let root = TempDir::new().unwrap();
    publish(root.path(), "foo", "1.0", "", Some(10));
    let repo = FsRepository::new(vec![root.path().to_path_buf()], None);
    let now = pkgenv_util::fs::now_secs();
    assert_eq!(repo.families_modified_between(0, now + 10), Some(true));
    assert_eq!(repo.families_modified_between(now + 10, now + 20), Some(false));
}

#[test]
fn local_modifications_count_past_the_epoch() {
    let local = TempDir::new().unwrap();
    let central = TempDir::new().unwrap();
    publish(central.path(), "foo", "1.0", "", Some(10));

    // Published directories were just created, so nothing changed in (10, 100].
    let published = FsRepository::new(vec![central.path().to_path_buf()], None);
    assert_eq!(published.families_modified_between(10, 100), Some(false));

    publish(local.path(), "foo", "2.0", "", None);
    let repo = FsRepository::new(
        vec![central.path().to_path_buf()],
        Some(local.path().to_path_buf()),
    );
    assert_eq!(repo.families_modified_between(10, 100), Some(true));
}
