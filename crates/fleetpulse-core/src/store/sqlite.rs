//! SQLite-backed device store.
//!
//! Timestamps are stored as unix milliseconds so staleness comparisons
//! are plain integer comparisons. The connection sits behind an async
//! mutex; query volume here is a handful of statements per 30-second
//! tick, so a single connection is the whole "pool".

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, params};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::model::{Device, DeviceStatus, NewDevice, StaleDevice, StatusCounts};

use super::{DeviceStore, to_chrono};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS devices (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    serial      TEXT NOT NULL UNIQUE,
    status      TEXT NOT NULL,
    last_seen   INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_devices_status ON devices (status);
CREATE INDEX IF NOT EXISTS idx_devices_last_seen ON devices (last_seen);
";

/// [`DeviceStore`] over a SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// An isolated in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Query(format!("timestamp out of range: {ms}")))
}

fn row_to_device(row: &rusqlite::Row<'_>) -> Result<Device, StoreError> {
    let status_raw: String = row.get(3)?;
    let status = DeviceStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Query(format!("unknown device status: {status_raw}")))?;
    Ok(Device {
        id: row.get(0)?,
        name: row.get(1)?,
        serial: row.get(2)?,
        status,
        last_seen: millis_to_utc(row.get(4)?)?,
        updated_at: millis_to_utc(row.get(5)?)?,
    })
}

#[async_trait]
impl DeviceStore for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM devices GROUP BY status")?;
        let mut rows = stmt.query([])?;

        let mut counts = StatusCounts::default();
        while let Some(row) = rows.next()? {
            let status_raw: String = row.get(0)?;
            let n: u64 = row.get(1)?;
            match DeviceStatus::parse(&status_raw) {
                Some(DeviceStatus::Active) => counts.active = n,
                Some(DeviceStatus::AuthRequired) => counts.auth_required = n,
                Some(DeviceStatus::Offline) => counts.offline = n,
                // Foreign rows written by some other tool: not ours to count.
                None => tracing::warn!(status = %status_raw, "ignoring unknown device status"),
            }
        }
        Ok(counts)
    }

    async fn mark_stale_offline(
        &self,
        threshold: Duration,
    ) -> Result<Vec<StaleDevice>, StoreError> {
        let cutoff = (Utc::now() - to_chrono(threshold)).timestamp_millis();
        let now_ms = Utc::now().timestamp_millis();

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let demoted = {
            let mut stmt = tx.prepare(
                "SELECT name, serial, last_seen FROM devices
                 WHERE status != 'offline' AND last_seen < ?1",
            )?;
            let mut rows = stmt.query(params![cutoff])?;
            let mut demoted = Vec::new();
            while let Some(row) = rows.next()? {
                demoted.push(StaleDevice {
                    name: row.get(0)?,
                    serial: row.get(1)?,
                    last_seen: millis_to_utc(row.get(2)?)?,
                });
            }
            demoted
        };

        if !demoted.is_empty() {
            tx.execute(
                "UPDATE devices SET status = 'offline', updated_at = ?1
                 WHERE status != 'offline' AND last_seen < ?2",
                params![now_ms, cutoff],
            )?;
        }
        tx.commit()?;
        Ok(demoted)
    }

    async fn insert_device(&self, device: NewDevice) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO devices (name, serial, status, last_seen, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                device.name,
                device.serial,
                device.status.as_str(),
                device.last_seen.timestamp_millis(),
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, serial, status, last_seen, updated_at
             FROM devices ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        let mut devices = Vec::new();
        while let Some(row) = rows.next()? {
            devices.push(row_to_device(row)?);
        }
        Ok(devices)
    }
}
