//! Integration tests over a real listening server.
//!
//! Each test binds an ephemeral port, seeds a `MemoryStore`, and talks
//! to the HTTP surface exactly the way the dashboard and the client
//! crate do.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use url::Url;

use fleetpulse_client::{PollingClient, PushChannel};
use fleetpulse_core::{
    Connectivity, DeviceStatus, DeviceStore, MemoryStore, NewDevice, SnapshotOrigin, TimingPolicy,
};
use fleetpulse_server::handlers::{HealthResponse, RecoveryResponse, StatsResponse};
use fleetpulse_server::{AppState, app};

/// Millisecond-scale delays, but a network-realistic connect timeout.
fn test_policy() -> TimingPolicy {
    TimingPolicy {
        connect_timeout: Duration::from_secs(2),
        ..TimingPolicy::fast()
    }
}

struct TestServer {
    base_url: Url,
    cancel: CancellationToken,
}

impl TestServer {
    async fn spawn(store: Arc<dyn DeviceStore>) -> Self {
        let state = Arc::new(AppState::new(store, test_policy()));
        let publisher = state.publisher.clone();

        let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr: SocketAddr = listener.local_addr().expect("local addr");

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            axum::serve(listener, app(state))
                .with_graceful_shutdown(async move {
                    shutdown.cancelled().await;
                    publisher.shutdown();
                })
                .await
                .expect("serve");
        });

        let base_url = Url::parse(&format!("http://{addr}/")).expect("url");
        Self { base_url, cancel }
    }

    fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("join")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn seed(store: &MemoryStore, status: DeviceStatus, count: usize) {
    for i in 0..count {
        store
            .insert_device(NewDevice {
                name: format!("{}-{i}", status.as_str()),
                serial: format!("SER-{}-{i}", status.as_str()),
                status,
                last_seen: Utc::now(),
            })
            .await
            .expect("insert");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_endpoint_reports_store_counts() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, DeviceStatus::Active, 2).await;
    seed(&store, DeviceStatus::AuthRequired, 1).await;
    let server = TestServer::spawn(store).await;

    let stats: StatsResponse = reqwest::get(server.url("api/device_stats"))
        .await
        .expect("request")
        .error_for_status()
        .expect("status")
        .json()
        .await
        .expect("decode");

    assert_eq!(stats.active, 2);
    assert_eq!(stats.auth_required, 1);
    assert_eq!(stats.offline, 0);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.status, "live");
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_endpoint_degrades_in_band_not_with_an_error_status() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);
    let server = TestServer::spawn(Arc::clone(&store) as Arc<dyn DeviceStore>).await;

    let response = reqwest::get(server.url("api/device_stats"))
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let stats: StatsResponse = response.json().await.expect("decode");
    assert_eq!(stats.status, "error");
    assert_eq!(stats.total, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reflects_database_reachability() {
    let store = Arc::new(MemoryStore::new());
    let server = TestServer::spawn(Arc::clone(&store) as Arc<dyn DeviceStore>).await;

    let health: HealthResponse = reqwest::get(server.url("api/health"))
        .await
        .expect("request")
        .json()
        .await
        .expect("decode");
    assert!(health.database);

    store.set_available(false);
    let health: HealthResponse = reqwest::get(server.url("api/health"))
        .await
        .expect("request")
        .json()
        .await
        .expect("decode");
    assert!(!health.database);
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_sweep_demotes_silent_devices() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, DeviceStatus::Active, 1).await;
    store
        .insert_device(NewDevice {
            name: "silent-switch".into(),
            serial: "SER-SILENT".into(),
            status: DeviceStatus::Active,
            last_seen: Utc::now() - ChronoDuration::minutes(15),
        })
        .await
        .expect("insert");
    let server = TestServer::spawn(store).await;

    let report: RecoveryResponse = reqwest::Client::new()
        .post(server.url("api/connection-recovery"))
        .send()
        .await
        .expect("request")
        .error_for_status()
        .expect("status")
        .json()
        .await
        .expect("decode");

    assert!(report.success);
    assert_eq!(report.stale_devices_found, 1);
    assert_eq!(report.stale_devices[0].name, "silent-switch");

    // The demotion is visible through the pull endpoint.
    let stats: StatsResponse = reqwest::get(server.url("api/device_stats"))
        .await
        .expect("request")
        .json()
        .await
        .expect("decode");
    assert_eq!(stats.offline, 1);
    assert_eq!(stats.active, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_reports_store_outage_as_service_unavailable() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);
    let server = TestServer::spawn(Arc::clone(&store) as Arc<dyn DeviceStore>).await;

    let response = reqwest::Client::new()
        .post(server.url("api/connection-recovery"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(flavor = "multi_thread")]
async fn push_channel_delivers_an_event_immediately_on_connect() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, DeviceStatus::Active, 3).await;
    let server = TestServer::spawn(store).await;

    let http = reqwest::Client::new();
    let mut channel = PushChannel::open(&http, &server.base_url, Duration::from_secs(2))
        .await
        .expect("open");

    let snapshot = tokio::time::timeout(Duration::from_secs(2), channel.next_snapshot())
        .await
        .expect("timely first event")
        .expect("channel healthy")
        .expect("stream open");
    assert_eq!(snapshot.counts.active, 3);
    assert_eq!(snapshot.origin, SnapshotOrigin::Live);
}

#[tokio::test(flavor = "multi_thread")]
async fn polling_client_round_trips_the_pull_endpoint() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, DeviceStatus::Offline, 2).await;
    let server = TestServer::spawn(store).await;

    let client = PollingClient::new(&server.base_url, Duration::from_secs(2)).expect("client");
    let snapshot = client.pull().await.expect("pull");
    assert_eq!(snapshot.counts.offline, 2);
    assert_eq!(snapshot.total, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn supervisor_reaches_live_against_a_real_server() {
    use fleetpulse_client::{ConnectionSupervisor, SupervisorConfig};

    let store = Arc::new(MemoryStore::new());
    seed(&store, DeviceStatus::Active, 1).await;
    let server = TestServer::spawn(store).await;

    let handle = ConnectionSupervisor::spawn(SupervisorConfig::new(
        server.base_url.clone(),
        test_policy(),
    ))
    .expect("spawn");

    let mut updates = handle.updates();
    let live = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = updates.borrow_and_update();
                if let Some(update) = current.as_ref() {
                    if update.connectivity == Connectivity::Live {
                        break update.clone();
                    }
                }
            }
            if updates.changed().await.is_err() {
                panic!("supervisor dropped before going live");
            }
        }
    })
    .await
    .expect("live within deadline");

    assert_eq!(live.snapshot.counts.active, 1);
    handle.shutdown();
}
