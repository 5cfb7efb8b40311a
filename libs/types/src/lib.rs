//! Types library for the exchange relay
//!
//! Shared definitions used by the signing library, the market-data mirror
//! and the gateway service.
//!
//! # Modules
//! - `ids`: Identifiers (ClientKey, SubscriberId)
//! - `credentials`: Exchange credentials and the validated CredentialStore
//! - `clock`: Wall-clock helpers (Unix seconds / milliseconds)
//! - `errors`: Configuration error taxonomy

// Public modules
pub mod clock;
pub mod credentials;
pub mod errors;
pub mod ids;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::credentials::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
}
