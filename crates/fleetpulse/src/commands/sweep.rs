use owo_colors::OwoColorize;
use serde::Deserialize;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::error::CliError;

#[derive(Debug, Deserialize)]
struct RecoveryReport {
    #[serde(rename = "staleDevicesFound")]
    stale_devices_found: u64,
    #[serde(rename = "staleDevices", default)]
    stale_devices: Vec<SweptDevice>,
}

#[derive(Debug, Deserialize)]
struct SweptDevice {
    name: String,
    serial: String,
}

/// Trigger an on-demand staleness sweep on the server.
pub async fn run(global: &GlobalOpts, config: &Config) -> Result<(), CliError> {
    let base = super::base_url(global, config)?;
    let url = base.join("api/connection-recovery")?;

    let policy = config.timing.to_policy();
    let http = reqwest::Client::builder()
        .timeout(policy.connect_timeout)
        .build()?;

    let report: RecoveryReport = http
        .post(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if report.stale_devices_found == 0 {
        println!("{} no stale devices", "ok".green());
        return Ok(());
    }

    println!(
        "{} demoted {} stale device(s) to offline:",
        "ok".green(),
        report.stale_devices_found
    );
    for device in &report.stale_devices {
        println!("  {} ({})", device.name, device.serial.dimmed());
    }
    Ok(())
}
