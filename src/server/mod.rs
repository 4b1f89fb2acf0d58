//! Command-line entry points.
//!
//! Binaries stay thin wrappers that only need to call [`run`].

pub mod admin;
pub mod cli;

use anyhow::Result;
use clap::Parser;
pub use admin::{argon2_from_config, run_command};
pub use cli::{AppConfig, Cli, Commands, CreateUserArgs};

/// Parse CLI arguments and execute the requested command.
///
/// # Errors
///
/// Returns any error emitted while parsing configuration or running the
/// command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli).await
}

/// Execute an already parsed [`Cli`].
///
/// # Errors
///
/// Propagates any failure reported by [`run_command`].
pub async fn run_with_cli(cli: Cli) -> Result<()> {
    let Cli { config, command } = cli;
    run_command(command, &config).await
}
