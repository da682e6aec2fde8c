//! Subcommand implementations.

mod seed;
mod serve;
mod stats;
mod sweep;
mod watch;

use url::Url;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = config::load(cli.global.config.as_deref())?;

    match cli.command {
        Command::Serve(args) => serve::run(args, &config).await,
        Command::Watch => watch::run(&cli.global, &config).await,
        Command::Stats(args) => stats::run(&args, &cli.global, &config).await,
        Command::Sweep => sweep::run(&cli.global, &config).await,
        Command::Seed(args) => seed::run(&args, &config).await,
    }
}

/// Server base URL: `--server` flag wins, then the config file.
fn base_url(global: &GlobalOpts, config: &Config) -> Result<Url, CliError> {
    let raw = global
        .server
        .as_deref()
        .unwrap_or(&config.client.base_url);
    Ok(Url::parse(raw)?)
}
