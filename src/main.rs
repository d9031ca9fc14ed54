//! dronewatch-api server entry point.
//!
//! Loads configuration, connects the selected store, seeds the default
//! admin, and serves the REST API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use dronewatch_api::api;
use dronewatch_api::app_state::AppState;
use dronewatch_api::auth::TokenService;
use dronewatch_api::config::{AppConfig, StoreBackend};
use dronewatch_api::persistence::{MemoryStore, PgStore, ReportStore, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, backend = ?config.store_backend, "starting dronewatch-api");
    if config.uses_development_secret() {
        tracing::warn!("JWT_SECRET not set; signing tokens with the development secret");
    }

    // Build persistence layer
    let (reports, users) = match config.store_backend {
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config)
                .await
                .context("connecting to PostgreSQL")?;
            store.migrate().await.context("running migrations")?;
            let store = Arc::new(store);
            (
                Arc::clone(&store) as Arc<dyn ReportStore>,
                store as Arc<dyn UserStore>,
            )
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            let store = Arc::new(MemoryStore::new());
            (
                Arc::clone(&store) as Arc<dyn ReportStore>,
                store as Arc<dyn UserStore>,
            )
        }
    };

    // Build service layer
    let tokens = TokenService::new(
        &config.jwt_secret,
        config.jwt_access_ttl_secs,
        config.jwt_refresh_ttl_secs,
    );
    let app_state = AppState::new(
        reports,
        users,
        tokens,
        config.store_timeout(),
        config.max_upload_bytes,
        config.upload_throttle(),
    );

    if let (Some(email), Some(password)) = (
        config.default_admin_email.as_deref(),
        config.default_admin_password.as_deref(),
    ) {
        app_state
            .auth
            .ensure_default_admin(email, password)
            .await
            .context("seeding the default admin")?;
    }

    // Build router
    let app = api::build_app(
        app_state,
        Duration::from_secs(config.request_timeout_secs),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
