//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`slow_api`], [`init`], [`validate`],
//! [`health`] or the hidden [`worker`]. Each handler lives in its own
//! submodule.

pub mod health;
pub mod init;
pub mod run;
pub mod slow_api;
pub mod validate;
pub mod worker;

use crate::cli::{Cli, Commands};
use crate::error::RelayError;

pub async fn dispatch(cli: Cli) -> Result<(), RelayError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::SlowApi(args)) => slow_api::execute(args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        Some(Commands::Worker(args)) => worker::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  slowrelay v{version} \u{2014} HTTP forwarding service\n\n  \
         No command provided. To get started:\n\n    \
         slowrelay slow-api                          Start the slow upstream on :8001\n    \
         slowrelay run -u http://localhost:8001/     Relay to it on :8000\n    \
         slowrelay init                              Generate a starter config\n    \
         slowrelay --help                            See all commands and options\n"
    );
}
