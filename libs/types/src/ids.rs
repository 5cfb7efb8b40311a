//! Identifier types for relay entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Rate-limit key identifying one client.
///
/// Usually the remote network address; falls back to `unknown` when the
/// transport does not expose one, so unidentifiable clients share a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    /// Create from any string identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Key used when no client address is available
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientKey {
    fn from(addr: IpAddr) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a downstream subscriber connection.
///
/// Allocated sequentially by the subscriber registry; never reused within a
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
