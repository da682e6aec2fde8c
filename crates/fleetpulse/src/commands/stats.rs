use owo_colors::OwoColorize;

use fleetpulse_client::PollingClient;
use fleetpulse_core::SnapshotOrigin;

use crate::cli::{GlobalOpts, StatsArgs};
use crate::config::Config;
use crate::error::CliError;

/// One-off pull from the stats endpoint.
pub async fn run(
    args: &StatsArgs,
    global: &GlobalOpts,
    config: &Config,
) -> Result<(), CliError> {
    let base = super::base_url(global, config)?;
    let policy = config.timing.to_policy();

    let client = PollingClient::new(&base, policy.connect_timeout)?;
    let snapshot = client.pull().await?;

    if args.json {
        // Serialization of a plain value struct cannot fail.
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).unwrap_or_default()
        );
        return Ok(());
    }

    let origin = match snapshot.origin {
        SnapshotOrigin::Live => "live".green().to_string(),
        SnapshotOrigin::Fallback => "fallback".yellow().to_string(),
        SnapshotOrigin::Error => "error".red().to_string(),
    };
    println!("snapshot at {} ({origin})", snapshot.timestamp.to_rfc3339());
    println!("  active        {}", snapshot.counts.active);
    println!("  auth required {}", snapshot.counts.auth_required);
    println!("  offline       {}", snapshot.counts.offline);
    println!("  total         {}", snapshot.total.bold());
    Ok(())
}
