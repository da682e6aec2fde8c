//! Clap derive structures for the `fleetpulse` CLI.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetpulse -- live device fleet status, pushed or pulled
#[derive(Debug, Parser)]
#[command(
    name = "fleetpulse",
    version,
    about = "Serve and observe near-real-time device fleet status",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file path (default: platform config dir)
    #[arg(long, env = "FLEETPULSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL (overrides config)
    #[arg(long, short = 's', env = "FLEETPULSE_SERVER_URL", global = true)]
    pub server: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the status distribution server
    Serve(ServeArgs),

    /// Follow live status updates (push channel with polling fallback)
    Watch,

    /// One-off snapshot from the pull endpoint
    Stats(StatsArgs),

    /// Trigger a staleness sweep on the server
    Sweep,

    /// Seed a local database with demo devices
    Seed(SeedArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, env = "FLEETPULSE_BIND")]
    pub bind: Option<IpAddr>,

    /// HTTP port
    #[arg(long, short = 'p', env = "FLEETPULSE_PORT")]
    pub port: Option<u16>,

    /// SQLite database path, or ":memory:" for an ephemeral store
    #[arg(long, short = 'd', env = "FLEETPULSE_DATABASE")]
    pub database: Option<String>,

    /// Run an unattended staleness sweep on this interval (seconds)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Emit raw JSON instead of the human summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// SQLite database path
    #[arg(long, short = 'd', env = "FLEETPULSE_DATABASE")]
    pub database: Option<String>,

    /// Devices to create per status (active / auth_required)
    #[arg(long, default_value = "3")]
    pub count: u32,

    /// Additionally create this many devices already silent past the
    /// staleness threshold
    #[arg(long, default_value = "1")]
    pub stale: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
