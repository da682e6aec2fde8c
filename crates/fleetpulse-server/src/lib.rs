//! HTTP surface for the fleetpulse status distribution system.
//!
//! Endpoints:
//!
//! - `GET /api/device_updates_stream` — long-lived SSE stream; one
//!   snapshot immediately on connect, then one per cadence tick.
//! - `GET /api/device_stats` — pull counterpart; always HTTP 200, with
//!   backend trouble signaled in-band via `_status`.
//! - `POST /api/connection-recovery` — runs one staleness sweep and
//!   reports which devices were demoted.
//! - `GET /api/health` — liveness plus database reachability.
//!
//! The server is a library; the `fleetpulse` binary wires config, store,
//! and shutdown signal together and calls [`serve`].

pub mod handlers;
pub mod publisher;
pub mod routes;
pub mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use fleetpulse_core::{DeviceStore, SnapshotSource, StalenessReaper, TimingPolicy};

pub use publisher::{StreamPublisher, Subscription};

/// Errors from running the HTTP server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind or serve: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state handed to every handler.
pub struct AppState {
    pub source: SnapshotSource,
    pub reaper: StalenessReaper,
    pub publisher: StreamPublisher,
    pub policy: TimingPolicy,
}

impl AppState {
    /// Wire the core components over one shared store.
    pub fn new(store: Arc<dyn DeviceStore>, policy: TimingPolicy) -> Self {
        let source = SnapshotSource::new(Arc::clone(&store), &policy);
        let reaper = StalenessReaper::new(store);
        let publisher = StreamPublisher::new(source.clone(), policy.push_cadence);
        Self {
            source,
            reaper,
            publisher,
            policy,
        }
    }
}

/// Build the full router with tracing and permissive CORS, matching the
/// browser-dashboard consumers the stream was built for.
pub fn app(state: Arc<AppState>) -> axum::Router {
    routes::api_routes()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

/// Bind and serve until `shutdown` fires.
///
/// Graceful shutdown also cancels the publisher, so every subscriber
/// task stops pushing before the process exits.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "fleetpulse server listening");

    let publisher_shutdown = state.publisher.clone();
    let router = app(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            publisher_shutdown.shutdown();
            tracing::info!("fleetpulse server shutting down");
        })
        .await?;
    Ok(())
}
