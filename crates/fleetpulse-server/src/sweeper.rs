//! Interval-driven staleness sweeping.
//!
//! The recovery endpoint runs sweeps on demand; deployments that want
//! them unattended spawn this loop alongside the server. Sweep failures
//! are logged and retried on the next tick — the interval itself is the
//! backoff.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fleetpulse_core::StalenessReaper;

/// Run a sweep every `interval` until `cancel` fires.
pub async fn run(
    reaper: StalenessReaper,
    interval: Duration,
    threshold: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The immediate first tick would race server startup for no benefit.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match reaper.sweep(threshold).await {
                    Ok(report) if report.count() > 0 => {
                        tracing::info!(demoted = report.count(), "periodic sweep demoted devices");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "periodic sweep failed, will retry next tick");
                    }
                }
            }
        }
    }
    tracing::debug!("sweeper loop exiting");
}
