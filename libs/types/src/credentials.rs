//! Exchange credentials and the validated credential store
//!
//! Secrets are read once from an environment-style source, validated, and
//! then shared read-only for the rest of the process. Presence of every
//! required secret (and, in production, the absence of placeholder values) is
//! fatal; format checks only produce warnings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::ConfigurationError;

// ---------------------------------------------------------------------------
// Variable names
// ---------------------------------------------------------------------------

pub const VAR_API_KEY: &str = "POLY_API_KEY";
pub const VAR_API_SECRET: &str = "POLY_API_SECRET";
pub const VAR_PASSPHRASE: &str = "POLY_PASSPHRASE";
pub const VAR_SIGNER_PRIVATE_KEY: &str = "SIGNER_PRIVATE_KEY";
pub const VAR_BUILDER_ID: &str = "BUILDER_ID";
pub const VAR_ENVIRONMENT: &str = "NODE_ENV";

const REQUIRED_VARS: [&str; 4] = [
    VAR_API_KEY,
    VAR_API_SECRET,
    VAR_PASSPHRASE,
    VAR_SIGNER_PRIVATE_KEY,
];

/// Substrings that mark a secret as copied from an example file.
const PLACEHOLDER_MARKERS: [&str; 4] = ["your_api_key", "example", "test", "placeholder"];

const MIN_SECRET_LEN: usize = 32;
const REDACTED: &str = "***REDACTED***";
const NOT_SET: &str = "NOT_SET";

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Environment-style key/value lookup.
pub trait CredentialSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl CredentialSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Runtime environment flag (`NODE_ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    /// Parse the flag; anything unrecognised counts as development.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn from_source(source: &impl CredentialSource) -> Self {
        source
            .get(VAR_ENVIRONMENT)
            .map(|raw| Self::parse(&raw))
            .unwrap_or(Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Exchange API credentials.
///
/// `Debug` never prints secret material.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub signer_private_key: String,
    /// Order attribution tag, attached to signed requests when present.
    pub builder_id: Option<String>,
}

impl Credentials {
    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("api_key");
        }
        if self.api_secret.is_empty() {
            missing.push("api_secret");
        }
        if self.passphrase.is_empty() {
            missing.push("passphrase");
        }
        if self.signer_private_key.is_empty() {
            missing.push("signer_private_key");
        }
        missing
    }

    /// Runtime presence check used before every signing operation.
    pub fn ensure_present(&self) -> Result<(), ConfigurationError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::CredentialsIncomplete(missing))
        }
    }

    /// Diagnostic view with secrets removed.
    pub fn redacted(&self, environment: Environment) -> RedactedCredentials {
        RedactedCredentials {
            api_key: prefix_or_not_set(&self.api_key),
            api_secret: redact_or_not_set(&self.api_secret),
            passphrase: redact_or_not_set(&self.passphrase),
            signer_private_key: redact_or_not_set(&self.signer_private_key),
            builder_id: self
                .builder_id
                .as_deref()
                .map(prefix_or_not_set)
                .unwrap_or_else(|| NOT_SET.to_string()),
            environment: environment.as_str(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &prefix_or_not_set(&self.api_key))
            .field("api_secret", &REDACTED)
            .field("passphrase", &REDACTED)
            .field("signer_private_key", &REDACTED)
            .field("builder_id", &self.builder_id.as_deref().map(prefix_or_not_set))
            .finish()
    }
}

/// Serializable, secret-free snapshot of the configured credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactedCredentials {
    #[serde(rename = "POLY_API_KEY")]
    pub api_key: String,
    #[serde(rename = "POLY_API_SECRET")]
    pub api_secret: String,
    #[serde(rename = "POLY_PASSPHRASE")]
    pub passphrase: String,
    #[serde(rename = "SIGNER_PRIVATE_KEY")]
    pub signer_private_key: String,
    #[serde(rename = "BUILDER_ID")]
    pub builder_id: String,
    #[serde(rename = "NODE_ENV")]
    pub environment: &'static str,
}

fn prefix_or_not_set(value: &str) -> String {
    if value.is_empty() {
        return NOT_SET.to_string();
    }
    let prefix: String = value.chars().take(8).collect();
    format!("{}...", prefix)
}

fn redact_or_not_set(value: &str) -> String {
    if value.is_empty() {
        NOT_SET.to_string()
    } else {
        REDACTED.to_string()
    }
}

// ---------------------------------------------------------------------------
// Format checks
// ---------------------------------------------------------------------------

/// Non-fatal format problems found during initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatWarning {
    ApiKeyCharset,
    ApiSecretTooShort { length: usize },
    PrivateKeyLength { length: usize, prefixed: bool },
    BuilderIdMissing,
}

impl fmt::Display for FormatWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatWarning::ApiKeyCharset => {
                write!(f, "{} contains characters outside [A-Za-z0-9_-]", VAR_API_KEY)
            }
            FormatWarning::ApiSecretTooShort { length } => write!(
                f,
                "{} appears too short ({} chars, minimum {})",
                VAR_API_SECRET, length, MIN_SECRET_LEN
            ),
            FormatWarning::PrivateKeyLength { length, prefixed } => write!(
                f,
                "{} may have incorrect length ({} chars, expected {})",
                VAR_SIGNER_PRIVATE_KEY,
                length,
                if *prefixed { 66 } else { 64 }
            ),
            FormatWarning::BuilderIdMissing => {
                write!(f, "{} not set; order attribution disabled", VAR_BUILDER_ID)
            }
        }
    }
}

/// Run the lightweight format checks. Never fails.
pub fn format_warnings(credentials: &Credentials) -> Vec<FormatWarning> {
    let mut warnings = Vec::new();

    let key_ok = credentials
        .api_key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !key_ok {
        warnings.push(FormatWarning::ApiKeyCharset);
    }

    if credentials.api_secret.len() < MIN_SECRET_LEN {
        warnings.push(FormatWarning::ApiSecretTooShort {
            length: credentials.api_secret.len(),
        });
    }

    let key = &credentials.signer_private_key;
    let prefixed = key.starts_with("0x");
    let expected = if prefixed { 66 } else { 64 };
    if key.len() != expected {
        warnings.push(FormatWarning::PrivateKeyLength {
            length: key.len(),
            prefixed,
        });
    }

    if credentials.builder_id.is_none() {
        warnings.push(FormatWarning::BuilderIdMissing);
    }

    warnings
}

fn reject_placeholders(credentials: &Credentials) -> Result<(), ConfigurationError> {
    let checked = [
        (VAR_API_KEY, &credentials.api_key),
        (VAR_API_SECRET, &credentials.api_secret),
        (VAR_PASSPHRASE, &credentials.passphrase),
    ];
    for (name, value) in checked {
        let lowered = value.to_ascii_lowercase();
        if PLACEHOLDER_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return Err(ConfigurationError::PlaceholderSecret {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Validated, process-wide credential configuration.
///
/// Built once by the composition root and handed to consumers; never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials: Arc<Credentials>,
    environment: Environment,
    warnings: Vec<FormatWarning>,
}

impl CredentialStore {
    /// Load and validate credentials from `source`.
    ///
    /// Fails if any required variable is absent or blank, or if a production
    /// deployment carries a placeholder secret.
    pub fn initialize(source: &impl CredentialSource) -> Result<Self, ConfigurationError> {
        let environment = Environment::from_source(source);

        let mut values = HashMap::new();
        let mut missing = Vec::new();
        for name in REQUIRED_VARS {
            match source.get(name).map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => {
                    values.insert(name, value);
                }
                _ => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingVariables(missing));
        }

        let mut take = |name: &str| values.remove(name).unwrap_or_default();
        let credentials = Credentials {
            api_key: take(VAR_API_KEY),
            api_secret: take(VAR_API_SECRET),
            passphrase: take(VAR_PASSPHRASE),
            signer_private_key: take(VAR_SIGNER_PRIVATE_KEY),
            builder_id: source
                .get(VAR_BUILDER_ID)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        };

        if environment.is_production() {
            reject_placeholders(&credentials)?;
        }

        let warnings = format_warnings(&credentials);
        for warning in &warnings {
            warn!(%warning, "Credential format check");
        }

        info!(
            environment = environment.as_str(),
            api_key = %prefix_or_not_set(&credentials.api_key),
            builder_id = credentials.builder_id.is_some(),
            "CredentialStore initialized"
        );

        Ok(Self {
            credentials: Arc::new(credentials),
            environment,
            warnings,
        })
    }

    /// Shared handle to the validated credentials.
    pub fn credentials(&self) -> Arc<Credentials> {
        Arc::clone(&self.credentials)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn warnings(&self) -> &[FormatWarning] {
        &self.warnings
    }

    pub fn redacted(&self) -> RedactedCredentials {
        self.credentials.redacted(self.environment)
    }
}
