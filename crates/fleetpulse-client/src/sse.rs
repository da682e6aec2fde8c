//! Push channel reader.
//!
//! Opens the server's SSE endpoint and decodes `data:` events into
//! snapshots. Parse failures on individual events are logged and the
//! event dropped — a malformed message is not a channel failure.

use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use url::Url;

use fleetpulse_core::{Snapshot, SnapshotOrigin, StatusCounts};

use crate::error::ClientError;

/// One SSE event's payload.
#[derive(Debug, Deserialize)]
struct StreamPayload {
    timestamp: DateTime<Utc>,
    stats: StatusCounts,
    #[serde(rename = "_status", default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "live".to_string()
}

impl StreamPayload {
    fn into_snapshot(self) -> Snapshot {
        let origin = match self.status.as_str() {
            "live" => SnapshotOrigin::Live,
            "fallback" => SnapshotOrigin::Fallback,
            _ => SnapshotOrigin::Error,
        };
        Snapshot {
            timestamp: self.timestamp,
            counts: self.stats,
            total: self.stats.total(),
            origin,
        }
    }
}

type EventStream = Pin<
    Box<
        dyn Stream<
                Item = Result<
                    eventsource_stream::Event,
                    eventsource_stream::EventStreamError<reqwest::Error>,
                >,
            > + Send,
    >,
>;

/// An open push channel.
pub struct PushChannel {
    events: EventStream,
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel").finish_non_exhaustive()
    }
}

impl PushChannel {
    /// Open the push channel, bounding the wait for the server's
    /// open-acknowledgement (response headers) by `connect_timeout`.
    pub async fn open(
        http: &reqwest::Client,
        base_url: &Url,
        connect_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let url = base_url.join("/api/device_updates_stream")?;
        let request = http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();

        let response = tokio::time::timeout(connect_timeout, request)
            .await
            .map_err(|_| ClientError::ConnectTimeout {
                timeout_ms: u64::try_from(connect_timeout.as_millis()).unwrap_or(u64::MAX),
            })??
            .error_for_status()?;

        tracing::debug!("push channel open");
        Ok(Self {
            events: Box::pin(response.bytes_stream().eventsource()),
        })
    }

    /// Next snapshot off the channel.
    ///
    /// `Ok(None)` means the server closed the stream cleanly; an `Err`
    /// is a channel-level failure. Undecodable events are skipped.
    pub async fn next_snapshot(&mut self) -> Result<Option<Snapshot>, ClientError> {
        loop {
            match self.events.next().await {
                Some(Ok(event)) => match serde_json::from_str::<StreamPayload>(&event.data) {
                    Ok(payload) => return Ok(Some(payload.into_snapshot())),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable stream event");
                    }
                },
                Some(Err(e)) => return Err(ClientError::Channel(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}
