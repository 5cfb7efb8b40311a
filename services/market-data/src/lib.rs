//! Market Data Mirror
//!
//! Keeps one resilient WebSocket connection to the exchange's market channel
//! and relays every inbound frame, unchanged, to all downstream subscribers.
//!
//! # Architecture
//!
//! ```text
//!   Exchange WS
//!        │
//!  ┌─────▼──────┐
//!  │ Connector  │  ← connect, split, reader/writer tasks
//!  └─────┬──────┘
//!        │ UpstreamEvent
//!  ┌─────▼──────┐
//!  │  Mirror    │  ← validate JSON, reconnect after delay, forever
//!  └─────┬──────┘
//!        │ Payload (serialized once)
//!  ┌─────▼──────┐
//!  │ Registry   │  ← snapshot subscribers, send to each open one
//!  └────────────┘
//! ```
//!
//! Payloads are opaque: nothing here interprets or stores book state.

pub mod config;
pub mod metrics;
pub mod mirror;
pub mod protocol;
pub mod subscribers;
pub mod upstream;

pub use config::MirrorConfig;
pub use mirror::{ConnectionState, MirrorError, OrderBookMirror};
pub use subscribers::{
    BroadcastReport, ChannelSubscriber, Payload, SendError, Subscriber, SubscriberRegistry,
    SubscriptionGuard,
};
pub use upstream::{TungsteniteConnector, UpstreamConnector, UpstreamEvent, UpstreamLink};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
