//! Stale-device reaper.
//!
//! Devices that stop reporting keep their last written status forever
//! unless something demotes them. [`StalenessReaper::sweep`] finds every
//! non-offline device silent past the threshold and marks it offline.
//!
//! Unlike the snapshot path, a store failure here is a hard error: the
//! caller triggered a sweep to act on the result, so it must learn that
//! the sweep did not run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CoreError, StoreError};
use crate::model::StaleDevice;
use crate::store::DeviceStore;

/// Attempts to reach the store before a sweep is abandoned.
const PING_ATTEMPTS: u32 = 3;
/// Delay between those attempts.
const PING_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of one staleness sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Devices demoted to offline by this sweep.
    pub demoted: Vec<StaleDevice>,
    /// When the sweep ran.
    pub swept_at: DateTime<Utc>,
}

impl SweepReport {
    pub fn count(&self) -> usize {
        self.demoted.len()
    }
}

/// Demotes devices that went silent past a threshold.
#[derive(Clone)]
pub struct StalenessReaper {
    store: Arc<dyn DeviceStore>,
    ping_retry_delay: Duration,
}

impl StalenessReaper {
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self {
            store,
            ping_retry_delay: PING_RETRY_DELAY,
        }
    }

    /// Shrink the connectivity-retry delay (tests).
    pub fn with_ping_retry_delay(mut self, delay: Duration) -> Self {
        self.ping_retry_delay = delay;
        self
    }

    /// Run one sweep with the given staleness threshold.
    ///
    /// Idempotent: a second sweep with no intervening reports demotes
    /// nothing. Errors only when the store stays unreachable through the
    /// connectivity retry budget, or the sweep statement itself fails.
    pub async fn sweep(&self, threshold: Duration) -> Result<SweepReport, CoreError> {
        self.ensure_reachable().await?;

        let demoted = self.store.mark_stale_offline(threshold).await?;
        let report = SweepReport {
            demoted,
            swept_at: Utc::now(),
        };

        if report.count() > 0 {
            tracing::info!(
                demoted = report.count(),
                threshold_secs = threshold.as_secs(),
                "staleness sweep demoted silent devices"
            );
        } else {
            tracing::debug!("staleness sweep found no silent devices");
        }
        Ok(report)
    }

    /// Bounded connectivity check before the sweep statement runs.
    async fn ensure_reachable(&self) -> Result<(), CoreError> {
        let mut last_err: Option<StoreError> = None;
        for attempt in 1..=PING_ATTEMPTS {
            match self.store.ping().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "device store unreachable before sweep");
                    last_err = Some(e);
                    if attempt < PING_ATTEMPTS {
                        tokio::time::sleep(self.ping_retry_delay).await;
                    }
                }
            }
        }
        Err(CoreError::SweepUnavailable {
            attempts: PING_ATTEMPTS,
            source: last_err
                .unwrap_or_else(|| StoreError::Unavailable("unreachable".into())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceStatus, NewDevice};
    use crate::store::MemoryStore;

    fn device(name: &str, status: DeviceStatus, minutes_ago: i64) -> NewDevice {
        NewDevice {
            name: name.to_string(),
            serial: format!("SN-{name}"),
            status,
            last_seen: Utc::now() - chrono::Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn sweep_demotes_only_silent_non_offline_devices() {
        let store = Arc::new(MemoryStore::new());
        store.insert_device(device("silent", DeviceStatus::Active, 11)).await.unwrap();
        store
            .insert_device(device("silent-auth", DeviceStatus::AuthRequired, 30))
            .await
            .unwrap();
        store.insert_device(device("fresh", DeviceStatus::Active, 2)).await.unwrap();
        store
            .insert_device(device("already-off", DeviceStatus::Offline, 120))
            .await
            .unwrap();

        let reaper = StalenessReaper::new(Arc::clone(&store) as Arc<dyn DeviceStore>);
        let report = reaper.sweep(Duration::from_secs(600)).await.unwrap();

        assert_eq!(report.count(), 2);
        let mut names: Vec<&str> = report.demoted.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["silent", "silent-auth"]);

        // Second sweep right away: idempotent.
        let again = reaper.sweep(Duration::from_secs(600)).await.unwrap();
        assert_eq!(again.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_store_is_a_hard_error() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);

        let reaper = StalenessReaper::new(Arc::clone(&store) as Arc<dyn DeviceStore>);
        let err = reaper.sweep(Duration::from_secs(600)).await.unwrap_err();
        assert!(matches!(err, CoreError::SweepUnavailable { attempts: 3, .. }));
    }
}
