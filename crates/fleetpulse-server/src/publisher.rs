//! Per-subscriber snapshot publishing.
//!
//! Each SSE connection gets its own timer task: compute a snapshot,
//! push it, wait one cadence tick, repeat. Subscribers are fully
//! independent — one slow or vanished consumer never delays another —
//! and ordering per subscriber is structural, because the loop awaits
//! each snapshot fetch before scheduling the next.
//!
//! Cancellation is likewise structural: the task selects on its own
//! token, on the receiver side closing, and re-checks the token after
//! every fetch, so no push can happen once disconnect is observed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use fleetpulse_core::{Snapshot, SnapshotSource};

/// Channel depth per subscriber. Latest-value semantics make depth
/// mostly irrelevant; a missed snapshot is superseded, never queued up
/// behind a slow consumer for long.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug)]
struct SubscriberEntry {
    created_at: DateTime<Utc>,
    cancel: CancellationToken,
}

/// Fans snapshots out to any number of independent subscribers.
///
/// Cheaply cloneable; clones share the subscriber registry and the
/// shutdown token.
#[derive(Clone)]
pub struct StreamPublisher {
    source: SnapshotSource,
    cadence: Duration,
    subscribers: Arc<DashMap<Uuid, SubscriberEntry>>,
    shutdown: CancellationToken,
}

impl StreamPublisher {
    pub fn new(source: SnapshotSource, cadence: Duration) -> Self {
        Self {
            source,
            cadence,
            subscribers: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a subscriber and spawn its timer task.
    ///
    /// The first snapshot is pushed immediately so a freshly connected
    /// observer is never left blank; one more follows per cadence tick.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let cancel = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);

        self.subscribers.insert(
            id,
            SubscriberEntry {
                created_at: Utc::now(),
                cancel: cancel.clone(),
            },
        );
        tracing::info!(
            subscriber = %id,
            subscribers = self.subscribers.len(),
            "subscriber connected"
        );

        let source = self.source.clone();
        let cadence = self.cadence;
        let registry = Arc::clone(&self.subscribers);
        tokio::spawn(async move {
            publish_loop(&source, cadence, &tx, &cancel).await;
            registry.remove(&id);
            tracing::info!(
                subscriber = %id,
                subscribers = registry.len(),
                "subscriber disconnected"
            );
        });

        Subscription { id, rx }
    }

    /// Number of live subscribers. Unbounded by design; exposed so
    /// deployments can watch it.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Age of the oldest live subscription, if any.
    pub fn oldest_subscriber(&self) -> Option<DateTime<Utc>> {
        self.subscribers.iter().map(|e| e.created_at).min()
    }

    /// Cancel one subscriber by id. Returns `false` if it was already
    /// gone.
    pub fn disconnect(&self, id: Uuid) -> bool {
        match self.subscribers.get(&id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every subscriber task. Used at server shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// One subscriber's timer loop. Exits on cancellation, on the receiver
/// closing, or on a failed push (receiver dropped mid-send).
async fn publish_loop(
    source: &SnapshotSource,
    cadence: Duration,
    tx: &mpsc::Sender<Snapshot>,
    cancel: &CancellationToken,
) {
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tx.closed() => break,
            _ = ticker.tick() => {
                // The in-flight fetch may complete after a disconnect,
                // but nothing gets pushed past this check.
                let snapshot = source.snapshot().await;
                if cancel.is_cancelled() {
                    break;
                }
                if tx.send(snapshot).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Handle to one subscriber's stream of snapshots.
///
/// Dropping it disconnects: the publisher task notices the closed
/// channel and releases the subscriber record.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Snapshot>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next snapshot, or `None` once the publisher side shut down.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Consume into the raw receiver, for wrapping in a response stream.
    pub fn into_receiver(self) -> mpsc::Receiver<Snapshot> {
        self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetpulse_core::{MemoryStore, SnapshotOrigin, TimingPolicy};

    fn publisher(cadence: Duration) -> StreamPublisher {
        let store = Arc::new(MemoryStore::new());
        let source = SnapshotSource::new(store, &TimingPolicy::default());
        StreamPublisher::new(source, cadence)
    }

    #[tokio::test(start_paused = true)]
    async fn first_snapshot_arrives_immediately() {
        let publisher = publisher(Duration::from_secs(30));
        let mut sub = publisher.subscribe();

        let first = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("first push should not wait for a cadence tick")
            .expect("publisher should still be up");
        assert_eq!(first.origin, SnapshotOrigin::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_keep_cadence_and_order() {
        let publisher = publisher(Duration::from_secs(30));
        let mut sub = publisher.subscribe();

        let mut last = sub.recv().await.expect("first snapshot");
        for _ in 0..3 {
            let next = sub.recv().await.expect("cadence snapshot");
            assert!(
                next.timestamp >= last.timestamp,
                "snapshots must arrive in non-decreasing timestamp order"
            );
            last = next;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_are_independent() {
        let publisher = publisher(Duration::from_secs(30));
        let mut a = publisher.subscribe();
        let b = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        // Dropping one subscriber must not break the other.
        drop(b);
        assert!(a.recv().await.is_some());
        let next = a.recv().await;
        assert!(next.is_some());

        // Give the dropped subscriber's task a chance to deregister.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(publisher.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_pushes_after_targeted_disconnect() {
        let publisher = publisher(Duration::from_secs(30));
        let mut sub = publisher.subscribe();
        let id = sub.id();
        let _ = sub.recv().await.expect("first snapshot");

        assert!(publisher.disconnect(id));
        assert!(!publisher.disconnect(Uuid::new_v4()));

        // Count deliveries over several would-be cadence ticks: the
        // channel must close without another push.
        let mut delivered = 0usize;
        while let Ok(Some(_)) =
            tokio::time::timeout(Duration::from_secs(120), sub.recv()).await
        {
            delivered += 1;
        }
        assert_eq!(delivered, 0, "no push may follow a disconnect");
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_pushes() {
        let publisher = publisher(Duration::from_secs(30));
        let mut sub = publisher.subscribe();
        let _ = sub.recv().await.expect("first snapshot");

        publisher.shutdown();

        // Drain whatever was already in flight; the channel must then
        // close with no further pushes.
        loop {
            match tokio::time::timeout(Duration::from_secs(120), sub.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => panic!("channel should close promptly after shutdown"),
            }
        }
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
