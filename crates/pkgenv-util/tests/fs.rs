use pkgenv_util::fs::{ensure_dir, expand_home, modified_secs, now_secs};
use tempfile::TempDir;

#[test]
fn test_ensure_dir_creates_nested() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("x").join("y").join("z");
    ensure_dir(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn test_ensure_dir_existing_is_ok() {
    let tmp = TempDir::new().unwrap();
    ensure_dir(tmp.path()).unwrap();
    assert!(tmp.path().is_dir());
}

#[test]
fn test_modified_secs_recent() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("package.toml");
    std::fs::write(&file, "").unwrap();
    let mtime = modified_secs(&file).unwrap();
    assert!(mtime > 0);
    assert!(mtime <= now_secs() + 1);
}

#[test]
fn test_modified_secs_missing() {
    let tmp = TempDir::new().unwrap();
    assert!(modified_secs(&tmp.path().join("nope")).is_err());
}

#[test]
fn test_expand_home_plain_path_untouched() {
    assert_eq!(
        expand_home("/opt/packages"),
        std::path::PathBuf::from("/opt/packages")
    );
}

#[test]
fn test_expand_home_tilde() {
    let expanded = expand_home("~/packages");
    assert!(expanded.ends_with("packages"));
    assert!(!expanded.to_string_lossy().starts_with('~'));
}
