//! Pull-mode snapshot client.
//!
//! One GET per call against the stats endpoint. Used three ways: the
//! supervisor's initial probe, its permanent polling fallback, and
//! manual one-off refreshes from the CLI.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use fleetpulse_core::{Snapshot, SnapshotOrigin, StatusCounts};

use crate::error::ClientError;

/// Stats endpoint response shape.
///
/// The server always answers 200 and signals backend trouble in-band
/// via `_status`, so deserialization succeeding does not mean the data
/// is live.
#[derive(Debug, Deserialize)]
pub struct StatsResponse {
    pub total: u64,
    pub active: u64,
    #[serde(rename = "authRequired")]
    pub auth_required: u64,
    pub offline: u64,
    #[serde(rename = "_status", default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "live".to_string()
}

impl StatsResponse {
    /// Convert to a snapshot, restoring the counts/total invariant from
    /// the counts (the authoritative side) if the server's total ever
    /// disagrees.
    pub fn into_snapshot(self, timestamp: DateTime<Utc>) -> Snapshot {
        let counts = StatusCounts {
            active: self.active,
            auth_required: self.auth_required,
            offline: self.offline,
        };
        if counts.total() != self.total {
            tracing::warn!(
                reported = self.total,
                computed = counts.total(),
                "stats response total disagrees with counts"
            );
        }
        Snapshot {
            timestamp,
            counts,
            total: counts.total(),
            origin: parse_origin(&self.status),
        }
    }
}

fn parse_origin(status: &str) -> SnapshotOrigin {
    match status {
        "live" => SnapshotOrigin::Live,
        "fallback" => SnapshotOrigin::Fallback,
        _ => SnapshotOrigin::Error,
    }
}

/// Issues single snapshot requests against the pull endpoint.
#[derive(Clone)]
pub struct PollingClient {
    http: reqwest::Client,
    stats_url: Url,
}

impl PollingClient {
    /// Build a client for the given server base URL.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fleetpulse-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            stats_url: base_url.join("/api/device_stats")?,
        })
    }

    /// Reuse an existing HTTP client (the supervisor shares one).
    pub(crate) fn with_http(http: reqwest::Client, base_url: &Url) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            stats_url: base_url.join("/api/device_stats")?,
        })
    }

    /// Fetch one snapshot.
    pub async fn pull(&self) -> Result<Snapshot, ClientError> {
        let response = self
            .http
            .get(self.stats_url.clone())
            .send()
            .await?
            .error_for_status()?;
        let stats: StatsResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        Ok(stats.into_snapshot(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn snapshot_invariant_is_restored_from_counts() {
        let stats = StatsResponse {
            total: 99,
            active: 2,
            auth_required: 1,
            offline: 0,
            status: "live".to_string(),
        };
        let snap = stats.into_snapshot(Utc::now());
        assert_eq!(snap.total, 3);
        assert_eq!(snap.total, snap.counts.total());
    }

    #[test]
    fn unknown_status_maps_to_error_origin() {
        assert_eq!(parse_origin("live"), SnapshotOrigin::Live);
        assert_eq!(parse_origin("fallback"), SnapshotOrigin::Fallback);
        assert_eq!(parse_origin("error"), SnapshotOrigin::Error);
        assert_eq!(parse_origin("???"), SnapshotOrigin::Error);
    }

    #[tokio::test]
    async fn pull_parses_the_stats_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/device_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 3,
                "active": 2,
                "authRequired": 1,
                "offline": 0,
                "_status": "live",
            })))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).expect("mock server uri");
        let client = PollingClient::new(&base, Duration::from_secs(5)).expect("client");
        let snap = client.pull().await.expect("pull");

        assert_eq!(snap.counts.active, 2);
        assert_eq!(snap.counts.auth_required, 1);
        assert_eq!(snap.counts.offline, 0);
        assert_eq!(snap.total, 3);
        assert_eq!(snap.origin, SnapshotOrigin::Live);
    }

    #[tokio::test]
    async fn http_error_statuses_surface_as_transport_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/device_stats"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).expect("mock server uri");
        let client = PollingClient::new(&base, Duration::from_secs(5)).expect("client");
        let err = client.pull().await.expect_err("should fail");
        assert!(err.is_transient());
    }
}
