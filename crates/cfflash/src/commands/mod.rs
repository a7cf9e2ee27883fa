//! Command dispatch: bridges CLI args -> core release cache -> output formatting.

pub mod config_cmd;
pub mod fetch;
pub mod inspect;
pub mod releases;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to its handler. Only network-bound commands build
/// the release cache.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        // Local commands don't touch the network
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Inspect(args) => inspect::handle(args, global).await,

        Command::Releases => releases::handle(&crate::build_cache(global)?, global).await,
        Command::Fetch(args) => fetch::handle(&crate::build_cache(global)?, args, global).await,
    }
}
