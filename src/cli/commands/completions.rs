//! Completions command - print shell completion scripts

use crate::cli::args::{Cli, CompletionsArgs};
use crate::error::BwcacheResult;
use clap::CommandFactory;

/// Execute the completions command
pub fn execute(args: CompletionsArgs) -> BwcacheResult<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(args.shell, &mut command, name, &mut std::io::stdout());
    Ok(())
}
