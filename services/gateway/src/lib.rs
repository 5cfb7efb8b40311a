//! Exchange relay gateway
//!
//! HTTP and WebSocket front door for the relay: rate limiting on every
//! route, signed pass-through to the exchange REST API, verified webhooks,
//! and downstream sockets fed by the order book mirror.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use config::{GatewayConfig, RateLimitConfig, RateLimitPolicies};
pub use error::AppError;
pub use rate_limit::{FixedWindowLimiter, RateLimitDecision, RateLimiters, SweepHandle};
pub use router::create_router;
pub use state::AppState;
