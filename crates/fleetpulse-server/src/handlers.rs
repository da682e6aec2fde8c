//! HTTP request handlers.
//!
//! Wire shapes follow the dashboard contract: the pull endpoint always
//! answers 200 with trouble signaled in-band via `_status`, so a caller
//! never mistakes backend trouble for a connectivity failure. Only the
//! recovery endpoint reports transport-level errors, because its caller
//! needs to know the sweep did not run.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use fleetpulse_core::{Snapshot, StaleDevice, StatusCounts};

use crate::AppState;

// ── Wire types ──────────────────────────────────────────────────────

/// Payload of one SSE event on the push channel.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamPayload {
    pub timestamp: DateTime<Utc>,
    pub stats: StatusCounts,
    #[serde(rename = "_status")]
    pub status: String,
}

impl From<Snapshot> for StreamPayload {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            stats: snapshot.counts,
            status: snapshot.origin.as_str().to_string(),
        }
    }
}

/// Response of the pull endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total: u64,
    pub active: u64,
    #[serde(rename = "authRequired")]
    pub auth_required: u64,
    pub offline: u64,
    #[serde(rename = "_status")]
    pub status: String,
}

impl From<Snapshot> for StatsResponse {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            total: snapshot.total,
            active: snapshot.counts.active,
            auth_required: snapshot.counts.auth_required,
            offline: snapshot.counts.offline,
            status: snapshot.origin.as_str().to_string(),
        }
    }
}

/// Response of the recovery endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecoveryResponse {
    pub success: bool,
    #[serde(rename = "staleDevicesFound")]
    pub stale_devices_found: usize,
    #[serde(rename = "staleDevices")]
    pub stale_devices: Vec<StaleDevice>,
}

/// Response of the health endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub timestamp: DateTime<Utc>,
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /api/device_updates_stream`
///
/// One event immediately on connect, then one per cadence tick, for as
/// long as the client stays connected. Degraded snapshots keep the
/// stream alive — the `_status` field carries the bad news.
pub async fn device_updates_stream(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let subscription = state.publisher.subscribe();
    let stream = sse_event_stream(subscription.into_receiver());

    (
        [(
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate",
        )],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
}

fn sse_event_stream(
    rx: tokio::sync::mpsc::Receiver<Snapshot>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(rx).map(|snapshot| {
        let payload = StreamPayload::from(snapshot);
        let event = match serde_json::to_string(&payload) {
            Ok(json) => Event::default().data(json),
            // Serializing a StreamPayload cannot realistically fail;
            // fall back to a bare comment event rather than drop the tick.
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize stream payload");
                Event::default().comment("serialization failure")
            }
        };
        Ok(event)
    })
}

/// `GET /api/device_stats`
///
/// Always 200; `_status` distinguishes live data from the degraded
/// zero-count snapshot.
pub async fn device_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.source.snapshot().await;
    Json(StatsResponse::from(snapshot))
}

/// `POST /api/connection-recovery`
///
/// Runs one staleness sweep with the policy threshold. 503 when the
/// store stays unreachable through the sweep's retry budget.
pub async fn connection_recovery(State(state): State<Arc<AppState>>) -> Response {
    match state.reaper.sweep(state.policy.staleness_threshold).await {
        Ok(report) => Json(RecoveryResponse {
            success: true,
            stale_devices_found: report.count(),
            stale_devices: report.demoted,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "connection recovery failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "success": false,
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// `GET /api/health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.source.store().ping().await.is_ok();
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
        timestamp: Utc::now(),
    })
}
