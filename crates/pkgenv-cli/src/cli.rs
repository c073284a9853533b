//! CLI argument definitions for pkgenv.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pkgenv_core::config::ResolveMode;

#[derive(Parser, Debug)]
#[command(
    name = "pkgenv",
    version,
    about = "Resolve package requests into a conflict-free environment",
    long_about = "pkgenv resolves versioned package requests against installed package \
                  repositories into an ordered, conflict-free list of package versions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve package requests and print the packages, dependencies first
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Package requests, e.g. `maya-2012` `python-2.6+<3` `!foo-1` `~bar-2+`
    #[arg(required = true)]
    pub requests: Vec<String>,

    /// Candidate order: latest, earliest or none
    #[arg(long)]
    pub mode: Option<ResolveMode>,

    /// Ignore packages published after this time (epoch seconds)
    #[arg(long = "time", value_name = "EPOCH")]
    pub time: Option<u64>,

    /// Do not add the implicit platform request
    #[arg(long)]
    pub no_platform: bool,

    /// Give up after this many rejected candidates
    #[arg(long, value_name = "N")]
    pub max_fails: Option<usize>,

    /// Disable transitive requirement inference
    #[arg(long)]
    pub no_transitive: bool,

    /// Include build requirements of the requested packages
    #[arg(long)]
    pub build_requires: bool,

    /// Neither read nor write the resolve cache
    #[arg(long)]
    pub no_cache: bool,

    /// Write the provenance graph as Graphviz dot, also on failure
    #[arg(long, value_name = "FILE")]
    pub dot: Option<PathBuf>,

    /// Package search root, replacing the configured ones (repeatable)
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}
