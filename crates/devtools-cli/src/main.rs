//! `devtools` - lint, format and test with automatic tool detection.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};
use devtools_core::OperationKind;

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    handlers::init_logging();

    let cli = Cli::parse();
    let config = handlers::load_config(cli.config.as_deref());

    let succeeded = match cli.command {
        Commands::Lint(target) => {
            handlers::handle_operation(config, OperationKind::Lint, &target).await?
        }
        Commands::Format(target) => {
            handlers::handle_operation(config, OperationKind::Format, &target).await?
        }
        Commands::Test(target) => {
            handlers::handle_operation(config, OperationKind::Test, &target).await?
        }
        Commands::Call { operation, args } => {
            handlers::handle_call(config, &operation, &args).await?
        }
        Commands::Config => {
            handlers::handle_config(&config)?;
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
