//! The device store seam.
//!
//! The fleet database is an external collaborator: report ingestion
//! writes to it, this system reads from it (and demotes stale devices).
//! Everything the system needs is behind the [`DeviceStore`] trait so
//! the snapshot and reaper paths never know which backend they talk to.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Device, NewDevice, StaleDevice, StatusCounts};

/// Operations the status distribution system needs from the fleet
/// database.
///
/// Object-safe on purpose — the server holds an `Arc<dyn DeviceStore>`
/// shared by every subscriber task, and the backend must tolerate
/// concurrent callers without serialization beyond its own.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Cheap connectivity check (`SELECT 1` equivalent).
    async fn ping(&self) -> Result<(), StoreError>;

    /// Count devices grouped by status.
    async fn count_by_status(&self) -> Result<StatusCounts, StoreError>;

    /// Demote every non-offline device silent longer than `threshold`
    /// to `offline`, bumping its modification time. Returns the identity
    /// of each demoted device; idempotent when nothing reported in
    /// between.
    async fn mark_stale_offline(
        &self,
        threshold: Duration,
    ) -> Result<Vec<StaleDevice>, StoreError>;

    /// Register a device. Used by seeding and tests — report ingestion
    /// proper lives outside this system.
    async fn insert_device(&self, device: NewDevice) -> Result<i64, StoreError>;

    /// All device records, ordered by id. Seeding/diagnostic helper.
    async fn list_devices(&self) -> Result<Vec<Device>, StoreError>;
}

/// Convert a wall-clock staleness threshold into a chrono duration.
///
/// `Duration::MAX`-ish policies clamp to chrono's maximum, which simply
/// means "nothing is ever stale".
pub(crate) fn to_chrono(threshold: Duration) -> chrono::Duration {
    chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX)
}
