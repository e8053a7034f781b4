use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crowdfund_backend::api::{RateLimitConfig, create_router_with_rate_limit};
use crowdfund_backend::app::{AppConfig, AppState, TokenService};
use crowdfund_backend::infra::{
    LocalBlobStorage, PostgresClient, init_metrics, init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let tokens = TokenService::new(&config.jwt_secret, config.token_ttl)
        .context("invalid token configuration")?;

    let db = PostgresClient::with_defaults(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    db.run_migrations().await.context("migrations failed")?;

    let storage = Arc::new(LocalBlobStorage::new(&config.upload_dir));
    info!(upload_dir = %storage.root().display(), "Storing uploads locally");

    let mut state = AppState::new(
        Arc::new(db),
        storage.clone(),
        tokens,
        config.max_upload_bytes,
    )
    .with_upload_dir(storage.root());
    match init_metrics() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!(error = %e, "Metrics recorder unavailable"),
    }

    let router = create_router_with_rate_limit(Arc::new(state), RateLimitConfig::from(&config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
