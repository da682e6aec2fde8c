use owo_colors::OwoColorize;

use fleetpulse_client::{ConnectionSupervisor, StatusUpdate, SupervisorConfig};
use fleetpulse_core::Connectivity;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::error::CliError;

/// Follow live status updates until ctrl-c.
pub async fn run(global: &GlobalOpts, config: &Config) -> Result<(), CliError> {
    let base = super::base_url(global, config)?;
    let policy = config.timing.to_policy();
    eprintln!("watching {base} (ctrl-c to stop)");

    let handle = ConnectionSupervisor::spawn(SupervisorConfig::new(base, policy))?;
    let mut updates = handle.updates();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown();
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = updates.borrow_and_update().clone();
                if let Some(update) = update {
                    print_update(&update);
                }
            }
        }
    }
    Ok(())
}

fn print_update(update: &StatusUpdate) {
    let tag = match update.connectivity {
        Connectivity::Live => "live    ".green().to_string(),
        Connectivity::Fallback => "fallback".yellow().to_string(),
        Connectivity::Error => "error   ".red().to_string(),
    };
    let snap = &update.snapshot;
    println!(
        "{} [{tag}] active={} auth_required={} offline={} total={}",
        snap.timestamp.format("%H:%M:%S"),
        snap.counts.active,
        snap.counts.auth_required,
        snap.counts.offline,
        snap.total,
    );
}
