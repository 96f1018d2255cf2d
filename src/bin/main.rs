//! qaserve binary.
//!
//! Entry point for the question-answering service: `serve` runs the HTTP API,
//! `fetch` warms the model cache and `ask` answers one question locally.

use clap::Parser;
use qaserve_core::{
    cli::{commands::Commands, handle_ask, handle_fetch, handle_serve, init_logging, Cli},
    config::ServiceConfig,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.logging)?;
    info!("qaserve {} starting up", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve(cmd) => {
            let config = ServiceConfig::load(&cmd.config)?;
            handle_serve(config).await?
        }
        Commands::Fetch(cmd) => {
            let config = ServiceConfig::load(&cmd.config)?;
            handle_fetch(config).await?
        }
        Commands::Ask(cmd) => {
            let config = ServiceConfig::load(&cmd.config)?;
            handle_ask(config, cmd.context, cmd.question).await?
        }
    }

    Ok(())
}
