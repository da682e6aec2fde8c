//! Connection supervisor: an explicit finite-state machine over the
//! push channel with capped exponential backoff and permanent polling
//! fallback.
//!
//! States and transitions:
//!
//! ```text
//! Init ──pull ok──▶ Connecting ──open──▶ Connected
//!  │                    ▲  │                 │
//!  │pull failed         │  │timeout/error    │channel error/close
//!  ▼                    │  ▼                 ▼
//! Polling ◀──budget──  RetryWait ◀───────────┘
//! (terminal)   spent
//! ```
//!
//! Once the retry budget is spent, `Polling` is terminal for the life
//! of the session: the supervisor never attempts to re-establish the
//! push channel. That mirrors the deployed behavior this system
//! replaces and is deliberate, not an oversight.
//!
//! The supervisor is single-threaded cooperative: one `select!` loop
//! reacts to channel events, timers, and the cancellation token, so
//! exactly one event drives a transition at a time.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use fleetpulse_core::{Connectivity, Snapshot, SnapshotOrigin, TimingPolicy};

use crate::error::ClientError;
use crate::poll::PollingClient;
use crate::sse::PushChannel;

// ── Public types ────────────────────────────────────────────────────

/// Where the supervisor currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Probing whether the server answers at all.
    Init,
    /// Opening the push channel.
    Connecting,
    /// Push channel open, snapshots flowing.
    Connected,
    /// Backing off before another open attempt.
    RetryWait,
    /// Permanent pull-mode fallback (terminal).
    Polling,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::RetryWait => "retry-wait",
            Self::Polling => "polling",
        }
    }
}

/// One delivered update: the latest snapshot plus how it got here.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub snapshot: Snapshot,
    pub connectivity: Connectivity,
    pub state: ConnectionState,
}

/// Everything the supervisor needs to run.
#[derive(Clone)]
pub struct SupervisorConfig {
    pub base_url: Url,
    pub policy: TimingPolicy,
}

impl SupervisorConfig {
    pub fn new(base_url: Url, policy: TimingPolicy) -> Self {
        Self { base_url, policy }
    }
}

/// Handle to a running supervisor.
///
/// Updates arrive on a `watch` channel (latest-value-wins, matching the
/// delivery semantics of the stream itself); state transitions arrive
/// on an unbounded channel so none is ever missed.
pub struct SupervisorHandle {
    updates: watch::Receiver<Option<StatusUpdate>>,
    transitions: mpsc::UnboundedReceiver<ConnectionState>,
    cancel: CancellationToken,
}

impl SupervisorHandle {
    /// Subscribe to delivered updates.
    pub fn updates(&self) -> watch::Receiver<Option<StatusUpdate>> {
        self.updates.clone()
    }

    /// The most recent update, if any was delivered yet.
    pub fn latest(&self) -> Option<StatusUpdate> {
        self.updates.borrow().clone()
    }

    /// Next state transition. `None` once the supervisor task exited.
    pub async fn next_transition(&mut self) -> Option<ConnectionState> {
        self.transitions.recv().await
    }

    /// Stop the supervisor: closes any open push channel and cancels
    /// pending timers, from any state.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Supervisor ──────────────────────────────────────────────────────

/// Spawns and owns the connection state machine for one subscriber.
pub struct ConnectionSupervisor;

impl ConnectionSupervisor {
    /// Start supervising. Returns immediately; the first update arrives
    /// asynchronously on the handle.
    pub fn spawn(config: SupervisorConfig) -> Result<SupervisorHandle, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fleetpulse-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let poller = PollingClient::with_http(http.clone(), &config.base_url)?;

        let (update_tx, update_rx) = watch::channel(None);
        let (state_tx, state_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let runner = Runner {
            config,
            http,
            poller,
            update_tx,
            state_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(runner.run());

        Ok(SupervisorHandle {
            updates: update_rx,
            transitions: state_rx,
            cancel,
        })
    }
}

struct Runner {
    config: SupervisorConfig,
    http: reqwest::Client,
    poller: PollingClient,
    update_tx: watch::Sender<Option<StatusUpdate>>,
    state_tx: mpsc::UnboundedSender<ConnectionState>,
    cancel: CancellationToken,
}

impl Runner {
    async fn run(self) {
        let mut state = ConnectionState::Init;
        let mut retries: u32 = 0;
        self.announce(state);

        // INIT: if even a single pull fails there is no point opening a
        // push channel; go straight to polling.
        match self.guarded(self.poller.pull()).await {
            None => return,
            Some(Ok(snapshot)) => {
                self.deliver(snapshot, ConnectionState::Init);
                state = self.transition(state, ConnectionState::Connecting);
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "initial pull failed, skipping push channel");
                state = self.transition(state, ConnectionState::Polling);
            }
        }

        loop {
            match state {
                ConnectionState::Connecting => {
                    match self
                        .guarded(PushChannel::open(
                            &self.http,
                            &self.config.base_url,
                            self.config.policy.connect_timeout,
                        ))
                        .await
                    {
                        None => return,
                        Some(Ok(channel)) => {
                            retries = 0;
                            state = self.transition(state, ConnectionState::Connected);
                            state = self.consume(channel, state).await;
                            if self.cancel.is_cancelled() {
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "push channel open failed");
                            state = self.transition(state, ConnectionState::RetryWait);
                        }
                    }
                }
                ConnectionState::RetryWait => {
                    retries += 1;
                    if retries >= self.config.policy.max_push_retries {
                        tracing::info!(
                            retries,
                            "push retry budget spent, falling back to polling for this session"
                        );
                        state = self.transition(state, ConnectionState::Polling);
                    } else {
                        // The counter is already incremented: the first
                        // observed wait is base * 2^1.
                        let delay = self.config.policy.backoff_delay(retries);
                        tracing::info!(delay_ms = delay.as_millis() as u64, retries, "backing off");
                        tokio::select! {
                            biased;
                            () = self.cancel.cancelled() => return,
                            () = tokio::time::sleep(delay) => {}
                        }
                        state = self.transition(state, ConnectionState::Connecting);
                    }
                }
                ConnectionState::Polling => {
                    self.poll_forever().await;
                    return;
                }
                // Init is left before the loop; Connected inside
                // `consume`. Reaching them here is unrepresentable.
                ConnectionState::Init | ConnectionState::Connected => return,
            }
        }
    }

    /// Consume the open channel until it errors or closes. Returns the
    /// follow-up state.
    async fn consume(&self, mut channel: PushChannel, state: ConnectionState) -> ConnectionState {
        loop {
            match self.guarded(channel.next_snapshot()).await {
                None => return state,
                Some(Ok(Some(snapshot))) => {
                    self.deliver(snapshot, ConnectionState::Connected);
                }
                Some(Ok(None)) => {
                    tracing::info!("push channel closed by server");
                    return self.transition(state, ConnectionState::RetryWait);
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "push channel error");
                    return self.transition(state, ConnectionState::RetryWait);
                }
            }
        }
    }

    /// Terminal pull loop: one request per interval, errors logged and
    /// retried next tick — the interval itself throttles load.
    async fn poll_forever(&self) {
        let mut ticker = tokio::time::interval(self.config.policy.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    match self.poller.pull().await {
                        Ok(snapshot) => self.deliver(snapshot, ConnectionState::Polling),
                        Err(e) => {
                            tracing::warn!(error = %e, "poll failed, retrying next tick");
                        }
                    }
                }
            }
        }
    }

    /// Run a future unless cancellation wins. `None` means shut down.
    async fn guarded<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> ConnectionState {
        tracing::debug!(from = from.as_str(), to = to.as_str(), "state transition");
        self.announce(to);
        to
    }

    fn announce(&self, state: ConnectionState) {
        // A dropped handle just means nobody is watching transitions.
        let _ = self.state_tx.send(state);
    }

    /// Report a snapshot to the consumer with the connectivity tag for
    /// the state it arrived in.
    fn deliver(&self, snapshot: Snapshot, state: ConnectionState) {
        let connectivity = match (state, snapshot.origin) {
            (_, SnapshotOrigin::Error) => Connectivity::Error,
            (ConnectionState::Connected, _) => Connectivity::Live,
            // The initial pull carries the backend's own verdict: a
            // healthy first paint is live even though the push channel
            // is not open yet.
            (ConnectionState::Init, SnapshotOrigin::Live) => Connectivity::Live,
            _ => Connectivity::Fallback,
        };
        let _ = self.update_tx.send(Some(StatusUpdate {
            snapshot,
            connectivity,
            state,
        }));
    }
}

// ── Tests ───────────────────────────────────────────────────────────
