//! Error types shared across the relay
//!
//! Configuration problems are the only condition allowed to stop the process,
//! so they get their own taxonomy using thiserror.

use thiserror::Error;

/// Missing or invalid secrets and settings.
///
/// Fatal at startup; surfaced as a server-side fault when detected later.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Production environment detected with example/placeholder secret in {name}")]
    PlaceholderSecret { name: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Credentials not configured: {}", .0.join(", "))]
    CredentialsIncomplete(Vec<&'static str>),
}

impl ConfigurationError {
    /// Convenience constructor for a value that failed to parse.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
