//! Command handlers: bridge CLI args to the store and format the results.

pub mod call;
pub mod config_cmd;
pub mod fetch;
pub mod util;

use storng_core::Store;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a store-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    store: &Store,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Fetch(args) => fetch::handle(store, resolved, args, global).await,
        Command::Call(args) => call::handle(store, resolved, args, global).await,
        // Config and Completions are handled before a store is built
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
