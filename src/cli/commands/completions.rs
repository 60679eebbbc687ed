//! Completions command - print a shell completion script

use crate::cli::args::{Cli, CompletionsArgs};
use crate::error::StoreResult;
use clap::CommandFactory;

/// Execute the completions command
pub fn execute(args: CompletionsArgs) -> StoreResult<()> {
    let mut command = Cli::command();
    clap_complete::generate(args.shell, &mut command, "pkgstore", &mut std::io::stdout());
    Ok(())
}
