//! Aegis CLI entry point.

use anyhow::Context;
use clap::Parser;

use aegis::cli::{Cli, Commands};
use aegis::infrastructure::logging::{LogConfig, LoggerImpl};
use aegis::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => ConfigLoader::load().context("Failed to load configuration"),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => aegis::cli::handle_error(err, cli.json),
    };

    let logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => aegis::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Chat(args) => aegis::cli::commands::chat::execute(args, config, cli.json).await,
        Commands::Plan(command) => {
            aegis::cli::commands::plan::execute(command, &config, cli.json).await
        }
    };

    if let Err(err) = result {
        drop(logger);
        aegis::cli::handle_error(err, cli.json);
    }
}
