//! Binary entry point for the `pressroom` administrative CLI.
//!
//! Command logic lives in `pressroom::server`; this binary only installs
//! logging and delegates.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pressroom=info")),
        )
        .with_writer(std::io::stderr)
        .init();
    pressroom::server::run().await
}
