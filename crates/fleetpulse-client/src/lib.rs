//! Subscriber side of the fleetpulse status stream.
//!
//! [`ConnectionSupervisor`] owns the lifecycle of one observer's
//! connection: it opens the push channel, retries with capped
//! exponential backoff when the channel fails, and falls back — for the
//! rest of the session — to pull-based polling once the retry budget is
//! spent. Consumers never see transport errors; every delivered
//! [`StatusUpdate`] carries the latest snapshot plus a connectivity tag.
//!
//! ```rust,ignore
//! use fleetpulse_client::{ConnectionSupervisor, SupervisorConfig};
//! use fleetpulse_core::TimingPolicy;
//! use url::Url;
//!
//! let config = SupervisorConfig::new(
//!     Url::parse("http://fleet.example:8080")?,
//!     TimingPolicy::default(),
//! );
//! let mut handle = ConnectionSupervisor::spawn(config)?;
//!
//! let mut updates = handle.updates();
//! while updates.changed().await.is_ok() {
//!     if let Some(update) = updates.borrow().clone() {
//!         println!("{} devices ({})", update.snapshot.total, update.connectivity.as_str());
//!     }
//! }
//! ```

pub mod error;
pub mod poll;
pub mod sse;
pub mod supervisor;

pub use error::ClientError;
pub use poll::PollingClient;
pub use sse::PushChannel;
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, StatusUpdate, SupervisorConfig, SupervisorHandle,
};
