//! Gateway configuration, read from an environment-style source.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use market_data::config::{DEFAULT_UPSTREAM_URL, MirrorConfig};
use relay_types::credentials::{CredentialSource, Environment};
use relay_types::errors::ConfigurationError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REST_URL: &str = "https://clob.polymarket.com";
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5 * 60 * 1000;

// ---------------------------------------------------------------------------
// Rate limit policies
// ---------------------------------------------------------------------------

/// One fixed-window policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    /// Returned in the 429 body.
    pub message: String,
    /// Give the slot back when the wrapped request succeeds (status < 400).
    pub skip_successful_requests: bool,
}

impl RateLimitConfig {
    pub fn new(window_ms: u64, max_requests: u32, message: impl Into<String>) -> Self {
        Self {
            window_ms,
            max_requests,
            message: message.into(),
            skip_successful_requests: false,
        }
    }

    /// Authentication-like endpoints: 5 requests per 15 minutes.
    pub fn strict() -> Self {
        Self::new(
            15 * 60 * 1000,
            5,
            "Too many authentication attempts, please try again later",
        )
    }

    /// Signed API calls: 100 requests per minute.
    pub fn standard() -> Self {
        Self::new(60 * 1000, 100, "API rate limit exceeded")
    }

    /// Public traffic: 300 requests per minute.
    pub fn lenient() -> Self {
        Self::new(60 * 1000, 300, "Rate limit exceeded")
    }

    /// Inbound webhooks: 50 per minute.
    pub fn webhook() -> Self {
        Self::new(60 * 1000, 50, "Webhook rate limit exceeded")
    }

    pub fn with_skip_successful_requests(mut self, skip: bool) -> Self {
        self.skip_successful_requests = skip;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60 * 1000, 100, "Too many requests, please try again later")
    }
}

/// The four policies the gateway installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicies {
    pub strict: RateLimitConfig,
    pub standard: RateLimitConfig,
    pub lenient: RateLimitConfig,
    pub webhook: RateLimitConfig,
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            strict: RateLimitConfig::strict(),
            standard: RateLimitConfig::standard(),
            lenient: RateLimitConfig::lenient(),
            webhook: RateLimitConfig::webhook(),
        }
    }
}

impl RateLimitPolicies {
    fn from_source(source: &impl CredentialSource) -> Result<Self, ConfigurationError> {
        let defaults = Self::default();
        Ok(Self {
            strict: policy_override(source, "STRICT", defaults.strict)?,
            standard: policy_override(source, "STANDARD", defaults.standard)?,
            lenient: policy_override(source, "LENIENT", defaults.lenient)?,
            webhook: policy_override(source, "WEBHOOK", defaults.webhook)?,
        })
    }
}

fn policy_override(
    source: &impl CredentialSource,
    name: &str,
    mut policy: RateLimitConfig,
) -> Result<RateLimitConfig, ConfigurationError> {
    policy.window_ms = parse_or(
        source,
        &format!("RATE_LIMIT_{}_WINDOW_MS", name),
        policy.window_ms,
    )?;
    policy.max_requests = parse_or(
        source,
        &format!("RATE_LIMIT_{}_MAX", name),
        policy.max_requests,
    )?;
    if policy.window_ms == 0 {
        return Err(ConfigurationError::invalid(
            format!("RATE_LIMIT_{}_WINDOW_MS", name),
            "window must be greater than zero",
        ));
    }
    Ok(policy)
}

// ---------------------------------------------------------------------------
// Gateway configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub environment: Environment,
    /// Exchange REST base URL for the signed proxy.
    pub rest_url: String,
    pub mirror: MirrorConfig,
    pub rate_limits: RateLimitPolicies,
    pub sweep_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            environment: Environment::Development,
            rest_url: DEFAULT_REST_URL.to_string(),
            mirror: MirrorConfig::default(),
            rate_limits: RateLimitPolicies::default(),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

impl GatewayConfig {
    pub fn from_source(source: &impl CredentialSource) -> Result<Self, ConfigurationError> {
        let defaults = MirrorConfig::default();
        let mirror = MirrorConfig {
            upstream_url: string_or(source, "POLY_WS_URL", DEFAULT_UPSTREAM_URL),
            reconnect_delay: Duration::from_millis(parse_or(
                source,
                "MIRROR_RECONNECT_DELAY_MS",
                defaults.reconnect_delay.as_millis() as u64,
            )?),
            connect_timeout: Duration::from_millis(parse_or(
                source,
                "MIRROR_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout.as_millis() as u64,
            )?),
            subscriber_buffer: parse_or(source, "SUBSCRIBER_BUFFER", defaults.subscriber_buffer)?,
        };

        Ok(Self {
            bind_addr: parse_or(source, "BIND_ADDR", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(source, "PORT", DEFAULT_PORT)?,
            environment: Environment::from_source(source),
            rest_url: string_or(source, "POLY_REST_URL", DEFAULT_REST_URL)
                .trim_end_matches('/')
                .to_string(),
            mirror,
            rate_limits: RateLimitPolicies::from_source(source)?,
            sweep_interval: Duration::from_millis(parse_or(
                source,
                "RATE_LIMIT_SWEEP_INTERVAL_MS",
                DEFAULT_SWEEP_INTERVAL_MS,
            )?),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn string_or(source: &impl CredentialSource, name: &str, default: &str) -> String {
    source
        .get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(
    source: &impl CredentialSource,
    name: &str,
    default: T,
) -> Result<T, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.get(name).map(|v| v.trim().to_string()) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e: T::Err| ConfigurationError::invalid(name, format!("{:?}: {}", raw, e))),
        _ => Ok(default),
    }
}
