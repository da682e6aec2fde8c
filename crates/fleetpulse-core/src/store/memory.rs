//! In-memory device store for tests and demos.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::model::{Device, DeviceStatus, NewDevice, StaleDevice, StatusCounts};

use super::{DeviceStore, to_chrono};

/// `DashMap`-backed [`DeviceStore`].
///
/// An availability switch lets tests simulate a store outage: while
/// unavailable, every operation fails with
/// [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: DashMap<i64, Device>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the simulated availability of the backing database.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        self.check_available()?;
        let mut counts = StatusCounts::default();
        for entry in &self.devices {
            counts.record(entry.status);
        }
        Ok(counts)
    }

    async fn mark_stale_offline(
        &self,
        threshold: Duration,
    ) -> Result<Vec<StaleDevice>, StoreError> {
        self.check_available()?;
        let now = Utc::now();
        let threshold = to_chrono(threshold);
        let mut demoted = Vec::new();

        for mut entry in self.devices.iter_mut() {
            if entry.is_stale(now, threshold) {
                entry.status = DeviceStatus::Offline;
                entry.updated_at = now;
                demoted.push(StaleDevice {
                    name: entry.name.clone(),
                    serial: entry.serial.clone(),
                    last_seen: entry.last_seen,
                });
            }
        }
        Ok(demoted)
    }

    async fn insert_device(&self, device: NewDevice) -> Result<i64, StoreError> {
        self.check_available()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.devices.insert(
            id,
            Device {
                id,
                name: device.name,
                serial: device.serial,
                status: device.status,
                last_seen: device.last_seen,
                updated_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        self.check_available()?;
        let mut devices: Vec<Device> =
            self.devices.iter().map(|e| e.value().clone()).collect();
        devices.sort_by_key(|d| d.id);
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(status: DeviceStatus, minutes_ago: i64) -> NewDevice {
        NewDevice {
            name: format!("device-{status}-{minutes_ago}"),
            serial: format!("SN-{status}-{minutes_ago}"),
            status,
            last_seen: Utc::now() - chrono::Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn counts_group_by_status() {
        let store = MemoryStore::new();
        store.insert_device(seed(DeviceStatus::Active, 0)).await.unwrap();
        store.insert_device(seed(DeviceStatus::Active, 1)).await.unwrap();
        store
            .insert_device(seed(DeviceStatus::AuthRequired, 0))
            .await
            .unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.active, 2);
        assert_eq!(counts.auth_required, 1);
        assert_eq!(counts.offline, 0);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn outage_switch_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_available(false);

        let err = store.count_by_status().await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.ping().await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn stale_sweep_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_device(seed(DeviceStatus::Active, 11)).await.unwrap();
        store.insert_device(seed(DeviceStatus::Active, 1)).await.unwrap();

        let threshold = Duration::from_secs(600);
        let first = store.mark_stale_offline(threshold).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = store.mark_stale_offline(threshold).await.unwrap();
        assert!(second.is_empty(), "second sweep should find nothing");

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.offline, 1);
        assert_eq!(counts.active, 1);
    }
}
