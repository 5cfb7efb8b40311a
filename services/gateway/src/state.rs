use std::sync::Arc;
use std::time::Instant;

use market_data::OrderBookMirror;
use relay_signing::{RequestSigner, WebhookVerifier};
use relay_types::credentials::CredentialStore;
use reqwest::Client;

use crate::config::GatewayConfig;
use crate::rate_limit::RateLimiters;

/// Everything a handler may touch. Built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub credentials: Arc<CredentialStore>,
    pub signer: RequestSigner,
    pub verifier: Arc<WebhookVerifier>,
    pub rate_limiters: RateLimiters,
    pub mirror: Arc<OrderBookMirror>,
    pub http_client: Client,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        credentials: CredentialStore,
        mirror: Arc<OrderBookMirror>,
    ) -> Self {
        let signer = RequestSigner::new(credentials.credentials());
        let verifier = WebhookVerifier::from_credentials(&credentials.credentials());
        let rate_limiters = RateLimiters::new(&config.rate_limits);

        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            signer,
            verifier: Arc::new(verifier),
            rate_limiters,
            mirror,
            http_client: Client::new(),
            started_at: Instant::now(),
        }
    }
}
