// ── Fleet status domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reported operational status of a device.
///
/// Mutated only by report ingestion (external to this system) and by the
/// [`StalenessReaper`](crate::StalenessReaper), which demotes silent
/// devices to [`Offline`](Self::Offline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    AuthRequired,
    Offline,
}

impl DeviceStatus {
    /// Stable string form, matching the wire and database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::AuthRequired => "auth_required",
            Self::Offline => "offline",
        }
    }

    /// Parse the stable string form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "auth_required" => Some(Self::AuthRequired),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device record as held by the device store.
///
/// Read-only to this system apart from the reaper's status demotion;
/// devices are never created or deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub serial: String,
    pub status: DeviceStatus,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Whether this device has been silent longer than `threshold`,
    /// measured against `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.status != DeviceStatus::Offline && now - self.last_seen > threshold
    }
}

/// Fields needed to register a device, used by seeding and tests.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub name: String,
    pub serial: String,
    pub status: DeviceStatus,
    pub last_seen: DateTime<Utc>,
}

/// Identity of a device demoted by a staleness sweep, in the shape the
/// recovery endpoint reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleDevice {
    pub name: String,
    pub serial: String,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
}

// ── StatusCounts ────────────────────────────────────────────────────

/// Number of devices per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub active: u64,
    pub auth_required: u64,
    pub offline: u64,
}

impl StatusCounts {
    /// Total devices across all statuses.
    pub fn total(self) -> u64 {
        self.active + self.auth_required + self.offline
    }

    /// Count for one status.
    pub fn get(self, status: DeviceStatus) -> u64 {
        match status {
            DeviceStatus::Active => self.active,
            DeviceStatus::AuthRequired => self.auth_required,
            DeviceStatus::Offline => self.offline,
        }
    }

    /// Add one device with the given status.
    pub fn record(&mut self, status: DeviceStatus) {
        match status {
            DeviceStatus::Active => self.active += 1,
            DeviceStatus::AuthRequired => self.auth_required += 1,
            DeviceStatus::Offline => self.offline += 1,
        }
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// How trustworthy the data inside a [`Snapshot`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    /// Counts were read from the store just now.
    Live,
    /// Counts came from a degraded path (store unreachable, zeros served).
    Fallback,
    /// The store failed outright; counts are zeros.
    Error,
}

impl SnapshotOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
            Self::Error => "error",
        }
    }
}

/// A timestamped count of devices per status — the unit of data pushed
/// over the stream or returned from the pull endpoint.
///
/// Ephemeral: produced and consumed per tick, never persisted. The
/// invariant `total == counts.total()` holds by construction; both
/// constructors compute `total` rather than accepting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub counts: StatusCounts,
    pub total: u64,
    pub origin: SnapshotOrigin,
}

impl Snapshot {
    /// A snapshot freshly computed from store counts.
    pub fn live(counts: StatusCounts) -> Self {
        Self {
            timestamp: Utc::now(),
            counts,
            total: counts.total(),
            origin: SnapshotOrigin::Live,
        }
    }

    /// The degraded zero-count snapshot served when the store cannot be
    /// reached. The diagnostic travels out-of-band (log entry), never in
    /// the snapshot itself.
    pub fn degraded() -> Self {
        Self {
            timestamp: Utc::now(),
            counts: StatusCounts::default(),
            total: 0,
            origin: SnapshotOrigin::Error,
        }
    }

    /// Re-tag a snapshot with a different origin, keeping the invariant.
    pub fn with_origin(mut self, origin: SnapshotOrigin) -> Self {
        self.origin = origin;
        self
    }
}

// ── Connectivity ────────────────────────────────────────────────────

/// Client-visible connectivity tag attached to every delivered update.
///
/// Observers never see transport errors; they see the latest snapshot
/// plus this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Updates arrive over the push channel.
    Live,
    /// The push channel could not be sustained; updates come from polling.
    Fallback,
    /// The most recent update itself failed.
    Error,
}

impl Connectivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
            Self::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            DeviceStatus::Active,
            DeviceStatus::AuthRequired,
            DeviceStatus::Offline,
        ] {
            assert_eq!(DeviceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DeviceStatus::parse("rebooting"), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DeviceStatus::AuthRequired).unwrap();
        assert_eq!(json, "\"auth_required\"");
    }

    #[test]
    fn snapshot_total_matches_counts() {
        let counts = StatusCounts {
            active: 2,
            auth_required: 1,
            offline: 4,
        };
        let snap = Snapshot::live(counts);
        assert_eq!(snap.total, 7);
        assert_eq!(snap.total, snap.counts.total());
        assert_eq!(snap.origin, SnapshotOrigin::Live);
    }

    #[test]
    fn degraded_snapshot_is_zeroed_error() {
        let snap = Snapshot::degraded();
        assert_eq!(snap.total, 0);
        assert_eq!(snap.counts, StatusCounts::default());
        assert_eq!(snap.origin, SnapshotOrigin::Error);
    }

    #[test]
    fn record_keeps_counts_consistent() {
        let mut counts = StatusCounts::default();
        counts.record(DeviceStatus::Active);
        counts.record(DeviceStatus::Active);
        counts.record(DeviceStatus::Offline);
        assert_eq!(counts.active, 2);
        assert_eq!(counts.offline, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn staleness_respects_threshold_and_status() {
        let now = Utc::now();
        let device = Device {
            id: 1,
            name: "sensor-a".into(),
            serial: "SN-001".into(),
            status: DeviceStatus::Active,
            last_seen: now - chrono::Duration::minutes(11),
            updated_at: now,
        };
        assert!(device.is_stale(now, chrono::Duration::minutes(10)));
        assert!(!device.is_stale(now, chrono::Duration::minutes(15)));

        let offline = Device {
            status: DeviceStatus::Offline,
            ..device
        };
        // Already-offline devices are never "stale".
        assert!(!offline.is_stale(now, chrono::Duration::minutes(10)));
    }
}
