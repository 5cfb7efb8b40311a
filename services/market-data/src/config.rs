//! Mirror configuration.

use std::time::Duration;

/// Exchange market channel.
pub const DEFAULT_UPSTREAM_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

/// Configuration for the order book mirror.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Upstream WebSocket URL.
    pub upstream_url: String,
    /// Fixed delay between a disconnect and the next connect attempt (default: 5s).
    pub reconnect_delay: Duration,
    /// Upper bound on one connect attempt, handshake included (default: 10s).
    pub connect_timeout: Duration,
    /// Per-subscriber outbound queue capacity.
    pub subscriber_buffer: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            reconnect_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            subscriber_buffer: 256,
        }
    }
}
