//! Wire messages understood by the mirror.
//!
//! Market payloads themselves are opaque; only the subscription request sent
//! upstream and the command accepted from downstream clients have a shape.

use serde::{Deserialize, Serialize};

/// Upstream subscription request: `{"type":"Market","assets":[...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub assets: Vec<String>,
}

impl SubscriptionRequest {
    pub fn market(assets: Vec<String>) -> Self {
        Self {
            kind: "Market".to_string(),
            assets,
        }
    }
}

/// Command sent by a downstream client over its socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Ask the mirror to subscribe upstream to these assets.
    Subscribe { assets: Vec<String> },
}

/// Parse a raw client frame; `None` for anything unrecognised.
pub fn parse_client_command(json: &str) -> Option<ClientCommand> {
    serde_json::from_str(json).ok()
}
