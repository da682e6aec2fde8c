use chrono::{Duration as ChronoDuration, Utc};

use fleetpulse_core::{DeviceStatus, DeviceStore, NewDevice, SqliteStore};

use crate::cli::SeedArgs;
use crate::config::Config;
use crate::error::CliError;

/// Populate a local database with demo devices, including a few that
/// are already silent past the staleness threshold.
pub async fn run(args: &SeedArgs, config: &Config) -> Result<(), CliError> {
    let database = args
        .database
        .as_deref()
        .unwrap_or(&config.server.database);
    let store = SqliteStore::open(database)?;

    let policy = config.timing.to_policy();
    let now = Utc::now();
    // Serials embed the seed time so repeated runs never collide.
    let run_tag = now.timestamp_millis();

    let mut created = 0u32;
    for i in 0..args.count {
        store
            .insert_device(NewDevice {
                name: format!("demo-active-{i}"),
                serial: format!("FP-A-{run_tag}-{i:03}"),
                status: DeviceStatus::Active,
                last_seen: now,
            })
            .await?;
        store
            .insert_device(NewDevice {
                name: format!("demo-auth-{i}"),
                serial: format!("FP-Q-{run_tag}-{i:03}"),
                status: DeviceStatus::AuthRequired,
                last_seen: now,
            })
            .await?;
        created += 2;
    }

    let stale_since = ChronoDuration::from_std(policy.staleness_threshold)
        .unwrap_or(ChronoDuration::MAX)
        .checked_add(&ChronoDuration::seconds(60))
        .unwrap_or(ChronoDuration::MAX);
    for i in 0..args.stale {
        store
            .insert_device(NewDevice {
                name: format!("demo-stale-{i}"),
                serial: format!("FP-S-{run_tag}-{i:03}"),
                status: DeviceStatus::Active,
                last_seen: now - stale_since,
            })
            .await?;
        created += 1;
    }

    println!("seeded {created} device(s) into {database} ({} stale)", args.stale);
    Ok(())
}
