use axum::{
    Router, middleware,
    routing::{any, get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{clob, config, health, signing, webhook, ws};
use crate::middleware::enforce_rate_limit;
use crate::state::AppState;

/// Build the HTTP surface.
///
/// The lenient limiter gates every route; the route-level limiters sit
/// inside it and their headers take precedence.
pub fn create_router(state: AppState) -> Router {
    let limiters = state.rate_limiters.clone();
    let standard = middleware::from_fn_with_state(limiters.standard.clone(), enforce_rate_limit);
    let webhook_limit =
        middleware::from_fn_with_state(limiters.webhook.clone(), enforce_rate_limit);
    let lenient = middleware::from_fn_with_state(limiters.lenient.clone(), enforce_rate_limit);

    let api_routes = Router::new()
        .route("/config", get(config::show_config).layer(standard.clone()))
        .route(
            "/test-signature",
            get(signing::test_signature).layer(standard.clone()),
        )
        .route("/clob/{*path}", any(clob::proxy).layer(standard))
        .route(
            "/webhooks/polymarket",
            post(webhook::polymarket_webhook).layer(webhook_limit),
        );

    Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api_routes)
        .layer(lenient)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
