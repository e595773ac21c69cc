//! ragcore CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use ragcore::cli::{self, Cli};
use ragcore::{ConfigLoader, LoggerImpl, RagSystem};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        cli::handle_error(&err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    let system = RagSystem::from_config(&config).context("Failed to set up the RAG system")?;
    cli::execute(cli.command, &system, cli.json).await
}
