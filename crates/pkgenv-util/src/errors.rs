use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for pkgenv operations outside the resolver proper.
#[derive(Debug, Error, Diagnostic)]
pub enum PkgenvError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed configuration file.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check ~/.pkgenv/config.toml (or $PKGENV_CONFIG) for syntax errors"))]
    Config { message: String },
}
