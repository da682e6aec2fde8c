//! Core domain layer for the fleetpulse status distribution system.
//!
//! This crate owns everything that is not an HTTP surface:
//!
//! - **Domain model** ([`model`]) — [`Device`], [`DeviceStatus`],
//!   [`StatusCounts`], and the ephemeral [`Snapshot`] that the push and
//!   pull endpoints deliver to observers.
//!
//! - **[`DeviceStore`]** — the seam to the device database. The rest of
//!   the system only ever needs three operations (ping, count by status,
//!   demote stale devices), so the store is a small object-safe trait
//!   with a SQLite implementation ([`SqliteStore`]) for deployments and
//!   an in-memory one ([`MemoryStore`]) for tests and demos.
//!
//! - **[`SnapshotSource`]** — computes status snapshots with a bounded
//!   retry against the store; never fails its caller, degrading to a
//!   zero-count snapshot tagged [`SnapshotOrigin::Error`] instead.
//!
//! - **[`StalenessReaper`]** — demotes devices that stopped reporting
//!   past a threshold to `offline`. Unlike the snapshot path this one
//!   surfaces store failures, because its callers act on the result.
//!
//! - **[`TimingPolicy`]** — every timing constant in one owned value,
//!   passed explicitly to the components that need it.

pub mod error;
pub mod model;
pub mod policy;
pub mod reaper;
pub mod snapshot;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::{CoreError, StoreError};
pub use model::{
    Connectivity, Device, DeviceStatus, NewDevice, Snapshot, SnapshotOrigin, StaleDevice,
    StatusCounts,
};
pub use policy::TimingPolicy;
pub use reaper::{StalenessReaper, SweepReport};
pub use snapshot::SnapshotSource;
pub use store::{DeviceStore, MemoryStore, SqliteStore};
