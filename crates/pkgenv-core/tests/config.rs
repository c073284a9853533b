use pkgenv_core::config::{dirs_path, GlobalConfig, ResolveMode};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_global_config_default_mode_latest() {
    let config = GlobalConfig::default();
    assert_eq!(config.resolve.mode, ResolveMode::Latest);
    assert!(config.resolve.max_fails.is_none());
}

#[test]
fn test_global_config_default_cache() {
    let config = GlobalConfig::default();
    assert_eq!(config.cache.dir, "~/.pkgenv/cache");
    assert!(config.cache.enabled);
}

#[test]
fn test_global_config_assume_transitive_defaults_true_from_toml() {
    let config: GlobalConfig = toml::from_str("").unwrap();
    assert!(config.resolve.assume_transitive);
}

#[test]
fn test_dirs_path_contains_pkgenv() {
    assert!(dirs_path().ends_with(".pkgenv"));
}

#[test]
fn test_global_config_parse_from_toml() {
    let toml = r#"
[resolve]
mode = "earliest"
max-fails = 20
assume-transitive = false
platform = "osx"

[repository]
search-roots = ["/opt/packages", "/srv/packages"]
local-root = "/home/dev/packages"

[cache]
dir = "/tmp/pkgenv-cache"
enabled = false
"#;
    let config: GlobalConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.resolve.mode, ResolveMode::Earliest);
    assert_eq!(config.resolve.max_fails, Some(20));
    assert!(!config.resolve.assume_transitive);
    assert_eq!(config.resolve.platform(), "osx");
    assert_eq!(config.repository.search_root_paths().len(), 2);
    assert_eq!(
        config.repository.local_root_path().unwrap(),
        std::path::PathBuf::from("/home/dev/packages")
    );
    assert!(!config.cache.enabled);
}

#[test]
fn test_platform_defaults_to_host() {
    let config = GlobalConfig::default();
    assert_eq!(config.resolve.platform(), std::env::consts::OS);
}

#[test]
fn test_resolve_mode_from_str() {
    assert_eq!("none".parse::<ResolveMode>().unwrap(), ResolveMode::None);
    assert!("newest".parse::<ResolveMode>().is_err());
}

#[test]
fn test_load_from_missing_file_is_default() {
    let config = GlobalConfig::load_from(std::path::Path::new("/nonexistent/config.toml")).unwrap();
    assert_eq!(config.resolve.mode, ResolveMode::Latest);
}

#[test]
fn test_load_from_invalid_file_errors() {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(b"[resolve\nmode = 1").unwrap();
    tmp.flush().unwrap();
    assert!(GlobalConfig::load_from(tmp.path()).is_err());
}
