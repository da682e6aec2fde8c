//! Snapshot computation with bounded retry.
//!
//! [`SnapshotSource`] is the single producer of [`Snapshot`] values for
//! both the push and pull paths. Its contract is that it never fails the
//! caller: a store outage is retried a bounded number of times for
//! transient hiccups, then surfaces as a degraded zero-count snapshot.
//! The diagnostic goes to the log, never into the snapshot.

use std::sync::Arc;
use std::time::Duration;

use crate::model::Snapshot;
use crate::policy::TimingPolicy;
use crate::store::DeviceStore;

/// Read-only snapshot producer over the device store.
#[derive(Clone)]
pub struct SnapshotSource {
    store: Arc<dyn DeviceStore>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl SnapshotSource {
    pub fn new(store: Arc<dyn DeviceStore>, policy: &TimingPolicy) -> Self {
        Self {
            store,
            retry_attempts: policy.store_retry_attempts.max(1),
            retry_delay: policy.store_retry_delay,
        }
    }

    /// Compute the current snapshot. Infallible: worst case is the
    /// degraded zero-count snapshot after the retry budget, roughly
    /// `(attempts - 1) * retry_delay` later.
    pub async fn snapshot(&self) -> Snapshot {
        let mut attempt: u32 = 0;
        loop {
            match self.store.count_by_status().await {
                Ok(counts) => return Snapshot::live(counts),
                Err(e) if e.is_transient() && attempt + 1 < self.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "device store unavailable, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    // Logical errors skip the retry loop entirely;
                    // re-running the same query buys nothing.
                    tracing::error!(error = %e, "device store failed, serving degraded snapshot");
                    return Snapshot::degraded();
                }
            }
        }
    }

    /// The store this source reads from.
    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }
}
