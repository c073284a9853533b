use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Global user configuration loaded from `~/.pkgenv/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub resolve: ResolveConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Order in which candidate versions are tried, or `None` to forbid
/// repository-driven disambiguation altogether.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    #[default]
    Latest,
    Earliest,
    None,
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolveMode::Latest => "latest",
            ResolveMode::Earliest => "earliest",
            ResolveMode::None => "none",
        })
    }
}

impl FromStr for ResolveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(ResolveMode::Latest),
            "earliest" => Ok(ResolveMode::Earliest),
            "none" => Ok(ResolveMode::None),
            other => Err(format!(
                "unknown resolve mode `{other}` (expected latest, earliest or none)"
            )),
        }
    }
}

/// Resolver settings from `[resolve]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    #[serde(default)]
    pub mode: ResolveMode,
    /// Abort after this many rejected candidates; unlimited when absent.
    #[serde(default, rename = "max-fails")]
    pub max_fails: Option<usize>,
    #[serde(default = "default_true", rename = "assume-transitive")]
    pub assume_transitive: bool,
    /// Platform package version; defaults to the host OS.
    #[serde(default)]
    pub platform: Option<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            mode: ResolveMode::default(),
            max_fails: None,
            assume_transitive: true,
            platform: None,
        }
    }
}

impl ResolveConfig {
    pub fn platform(&self) -> String {
        self.platform
            .clone()
            .unwrap_or_else(|| std::env::consts::OS.to_string())
    }
}

fn default_true() -> bool {
    true
}

/// Package search roots from `[repository]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default, rename = "search-roots")]
    pub search_roots: Vec<String>,
    /// Development root searched first; never cached.
    #[serde(default, rename = "local-root")]
    pub local_root: Option<String>,
}

impl RepositoryConfig {
    /// Search roots with `~` expanded.
    pub fn search_root_paths(&self) -> Vec<PathBuf> {
        self.search_roots
            .iter()
            .map(|r| pkgenv_util::fs::expand_home(r))
            .collect()
    }

    pub fn local_root_path(&self) -> Option<PathBuf> {
        self.local_root
            .as_deref()
            .map(pkgenv_util::fs::expand_home)
    }
}

/// Resolve and metadata cache configuration from `[cache]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn dir_path(&self) -> PathBuf {
        pkgenv_util::fs::expand_home(&self.dir)
    }
}

fn default_cache_dir() -> String {
    "~/.pkgenv/cache".to_string()
}

impl GlobalConfig {
    /// Load the global configuration from `$PKGENV_CONFIG` or
    /// `~/.pkgenv/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        let path = std::env::var("PKGENV_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        Self::load_from(&path)
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            pkgenv_util::errors::PkgenvError::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            }
        })?;
        toml::from_str(&content).map_err(|e| {
            pkgenv_util::errors::PkgenvError::Config {
                message: format!("Failed to parse {}: {e}", path.display()),
            }
            .into()
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the path to the pkgenv data directory (`~/.pkgenv/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".pkgenv")
}
