//! Handler for `pkgenv resolve`.

use std::path::Path;
use std::sync::Arc;

use miette::Result;

use pkgenv_core::config::GlobalConfig;
use pkgenv_core::request::parse_requests;
use pkgenv_repository::cache::{CacheStore, DirStore};
use pkgenv_repository::filesystem::FsRepository;
use pkgenv_resolver::cache::ResolveCache;
use pkgenv_resolver::graph::ProvenanceGraph;
use pkgenv_resolver::{ResolveOptions, Resolver};
use pkgenv_util::errors::PkgenvError;

use crate::cli::ResolveArgs;

pub fn exec(args: &ResolveArgs, verbose: bool) -> Result<()> {
    let config = GlobalConfig::load()?;
    let requests = parse_requests(&args.requests)?;

    let mut options = ResolveOptions::from_config(&config.resolve);
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if args.max_fails.is_some() {
        options.max_fails = args.max_fails;
    }
    if args.no_transitive {
        options.assume_transitive = false;
    }
    options.build_requires = args.build_requires;
    options.no_platform = args.no_platform;
    options.epoch = args.time;

    let search_roots = if args.roots.is_empty() {
        config.repository.search_root_paths()
    } else {
        args.roots.clone()
    };
    let local_root = config.repository.local_root_path();
    if search_roots.is_empty() && local_root.is_none() {
        return Err(PkgenvError::Config {
            message: "No package search roots configured; pass --root or set \
                      [repository] search-roots"
                .to_string(),
        }
        .into());
    }

    let store = if config.cache.enabled && !args.no_cache {
        open_store(&config.cache.dir_path())
    } else {
        None
    };

    let mut repo = FsRepository::new(search_roots, local_root);
    if let Some(store) = &store {
        repo = repo.with_store(Arc::clone(store));
    }
    let mut resolver = Resolver::new(&repo, options);
    if let Some(store) = store {
        resolver = resolver.with_cache(ResolveCache::new(store));
    }

    let result = match resolver.resolve(&requests) {
        Ok(result) => result,
        Err(e) => {
            if let (Some(path), Some(graph)) = (&args.dot, e.graph()) {
                write_dot(path, graph)?;
            }
            return Err(e.into());
        }
    };

    if let Some(path) = &args.dot {
        write_dot(path, &result.graph)?;
    }

    for package in &result.packages {
        println!("{}  {}", package.short_name(), package.root_path.display());
    }
    if verbose {
        if result.from_cache {
            eprintln!("Served from the resolve cache.");
        } else {
            eprintln!(
                "Resolved {} packages with {} failed attempts.",
                result.packages.len(),
                result.num_fails
            );
        }
    }

    Ok(())
}

/// The shared cache store, or `None` (with a warning) if it cannot be opened.
fn open_store(dir: &Path) -> Option<Arc<dyn CacheStore>> {
    match DirStore::new(dir) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::warn!("Resolve cache disabled: {e}");
            None
        }
    }
}

fn write_dot(path: &Path, graph: &ProvenanceGraph) -> Result<()> {
    std::fs::write(path, graph.to_dot()).map_err(PkgenvError::Io)?;
    tracing::info!("Wrote provenance graph to {}", path.display());
    Ok(())
}
