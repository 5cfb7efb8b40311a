use std::net::SocketAddr;
use std::sync::Arc;

use market_data::{OrderBookMirror, TungsteniteConnector};
use relay_gateway::{AppState, GatewayConfig, create_router};
use relay_types::credentials::{CredentialStore, ProcessEnv};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // A missing .env file is fine; the process environment still applies.
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,relay_gateway=debug")),
        )
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }
    info!("Starting exchange relay gateway");

    let config = GatewayConfig::from_source(&ProcessEnv)?;
    let credentials = CredentialStore::initialize(&ProcessEnv).inspect_err(|e| {
        error!(error = %e, "Critical configuration error. Exiting...");
    })?;

    // Upstream mirror runs for the life of the process
    let connector = Arc::new(TungsteniteConnector::new(config.mirror.upstream_url.clone()));
    let mirror = Arc::new(OrderBookMirror::new(config.mirror.clone(), connector));
    let mirror_task = mirror.spawn();

    let addr = config.socket_addr();
    let sweep_interval = config.sweep_interval;
    let environment = config.environment;

    let state = AppState::new(config, credentials, mirror);
    let sweeper = state.rate_limiters.spawn_sweeper(sweep_interval);
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, environment = environment.as_str(), "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.stop().await;
    if let Some(task) = mirror_task {
        task.abort();
    }
    info!("Server closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down gracefully..."),
        _ = terminate => info!("SIGTERM received, shutting down gracefully..."),
    }
}
