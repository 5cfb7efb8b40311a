//! Order book mirror
//!
//! Owns the single upstream session and keeps it alive forever: connect,
//! relay frames until the session ends, wait the fixed reconnect delay, and
//! go again. There is no backoff and no attempt cap.
//!
//! Connection bookkeeping lives behind one mutex together with a generation
//! counter. Each attempt takes a new generation, and a session may only clear
//! the state it created, so a stale session ending late can never mark a
//! newer one as disconnected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MirrorConfig;
use crate::metrics::{MetricsSnapshot, MirrorMetrics};
use crate::protocol::SubscriptionRequest;
use crate::subscribers::{
    BroadcastReport, Payload, Subscriber, SubscriberRegistry, SubscriptionGuard,
};
use crate::upstream::{UpstreamConnector, UpstreamEvent, UpstreamLink};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MirrorError {
    #[error("Upstream transport error: {0}")]
    Transport(String),

    #[error("Connection attempt already in progress")]
    AlreadyConnecting,
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

struct LinkState {
    phase: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::Sender<String>>,
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

pub struct OrderBookMirror {
    config: MirrorConfig,
    connector: Arc<dyn UpstreamConnector>,
    subscribers: SubscriberRegistry,
    link: Mutex<LinkState>,
    running: AtomicBool,
    metrics: MirrorMetrics,
}

impl OrderBookMirror {
    pub fn new(config: MirrorConfig, connector: Arc<dyn UpstreamConnector>) -> Self {
        Self {
            config,
            connector,
            subscribers: SubscriberRegistry::new(),
            link: Mutex::new(LinkState {
                phase: ConnectionState::Disconnected,
                generation: 0,
                outbound: None,
            }),
            running: AtomicBool::new(false),
            metrics: MirrorMetrics::new(),
        }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Start the connection loop on the runtime.
    ///
    /// Returns `None` if the loop is already running.
    pub fn spawn(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Order book mirror already running");
            return None;
        }
        Some(tokio::spawn(Arc::clone(self).run()))
    }

    /// Connect, relay, wait, reconnect. Never returns.
    async fn run(self: Arc<Self>) {
        let delay = self.config.reconnect_delay;
        loop {
            match self.connect_once().await {
                Ok(()) => info!(
                    delay_ms = delay.as_millis() as u64,
                    "Upstream connection closed. Reconnecting..."
                ),
                Err(MirrorError::AlreadyConnecting) => {
                    debug!("Skipping connect, another attempt is in progress")
                }
                Err(e) => warn!(
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream connection failed. Reconnecting..."
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one session to completion.
    ///
    /// Returns `Ok` when the upstream closed cleanly. An attempt that has not
    /// connected within `connect_timeout` fails with a transport error. Does
    /// not sleep or retry.
    pub async fn connect_once(&self) -> Result<(), MirrorError> {
        let generation = self.begin_connect().ok_or(MirrorError::AlreadyConnecting)?;
        self.metrics.record_connect_attempt();
        info!(generation, url = %self.config.upstream_url, "Connecting to upstream market feed");

        let timeout = self.config.connect_timeout;
        let attempt = match tokio::time::timeout(timeout, self.connector.connect()).await {
            Ok(attempt) => attempt,
            Err(_) => Err(MirrorError::Transport(format!(
                "connect timed out after {}ms",
                timeout.as_millis()
            ))),
        };
        let UpstreamLink { outbound, mut inbound } = match attempt {
            Ok(link) => link,
            Err(e) => {
                self.mark_disconnected(generation);
                return Err(e);
            }
        };
        self.mark_connected(generation, outbound);
        info!(generation, "Connected to upstream market feed");

        let outcome = loop {
            match inbound.recv().await {
                Some(UpstreamEvent::Frame(text)) => {
                    self.relay(&text);
                }
                Some(UpstreamEvent::Closed) | None => break Ok(()),
                Some(UpstreamEvent::Failed(reason)) => break Err(MirrorError::Transport(reason)),
            }
        };

        self.mark_disconnected(generation);
        outcome
    }

    /// Validate one upstream frame and fan it out verbatim.
    ///
    /// Malformed frames are logged and dropped; they never end the session.
    pub fn relay(&self, frame: &str) -> Option<BroadcastReport> {
        if let Err(e) = serde_json::from_str::<serde::de::IgnoredAny>(frame) {
            self.metrics.record_malformed();
            warn!(error = %e, len = frame.len(), "Dropping malformed upstream payload");
            return None;
        }

        let payload = Payload::copy_from_slice(frame.as_bytes());
        let report = self.subscribers.broadcast(&payload);
        self.metrics.record_broadcast(&report);
        Some(report)
    }

    /// Ask upstream for a market's updates.
    ///
    /// Only sent while connected; otherwise a no-op returning `false`.
    /// Subscriptions are not replayed after a reconnect.
    pub fn subscribe_to_market(&self, asset_id: &str) -> bool {
        let link = self.link.lock();
        let outbound = match (&link.phase, &link.outbound) {
            (ConnectionState::Connected, Some(outbound)) => outbound,
            _ => {
                debug!(
                    asset_id,
                    state = link.phase.as_str(),
                    "Not connected, market subscription ignored"
                );
                return false;
            }
        };

        let request = SubscriptionRequest::market(vec![asset_id.to_string()]);
        let text = match serde_json::to_string(&request) {
            Ok(text) => text,
            Err(e) => {
                warn!(asset_id, error = %e, "Failed to encode market subscription");
                return false;
            }
        };

        match outbound.try_send(text) {
            Ok(()) => {
                info!(asset_id, "Subscribed to market");
                true
            }
            Err(e) => {
                warn!(asset_id, error = %e, "Failed to send market subscription");
                false
            }
        }
    }

    /// Register a downstream subscriber; drop the guard to remove it.
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionGuard {
        let guard = self.subscribers.register(subscriber);
        info!(subscriber = %guard.id(), total = self.subscribers.len(), "Mirror subscriber added");
        guard
    }

    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn state(&self) -> ConnectionState {
        self.link.lock().phase
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of connection attempts started so far.
    pub fn connect_attempts(&self) -> u64 {
        self.metrics.connect_attempts()
    }

    pub fn generation(&self) -> u64 {
        self.link.lock().generation
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // -----------------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------------

    fn begin_connect(&self) -> Option<u64> {
        let mut link = self.link.lock();
        if link.phase != ConnectionState::Disconnected {
            return None;
        }
        link.generation += 1;
        link.phase = ConnectionState::Connecting;
        link.outbound = None;
        Some(link.generation)
    }

    fn mark_connected(&self, generation: u64, outbound: mpsc::Sender<String>) {
        let mut link = self.link.lock();
        if link.generation == generation {
            link.phase = ConnectionState::Connected;
            link.outbound = Some(outbound);
        }
    }

    fn mark_disconnected(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation {
            link.phase = ConnectionState::Disconnected;
            link.outbound = None;
        }
    }
}

impl std::fmt::Debug for OrderBookMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBookMirror")
            .field("upstream_url", &self.config.upstream_url)
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
