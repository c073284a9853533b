//! Command dispatch and handler modules.

mod resolve;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Resolve(args) => resolve::exec(&args, cli.verbose),
    }
}
