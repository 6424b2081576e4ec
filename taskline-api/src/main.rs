//! # Taskline API Server
//!
//! Resolves every request's bearer credential to a local account and an
//! effective role, then serves the task, delegation and directory endpoints.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... ISSUER_JWT_SECRET=... cargo run -p taskline-api
//! ```

use taskline_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskline_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "taskline_api=debug,taskline_shared=info,tower_http=debug";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Taskline API Server v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    if config.is_production() {
        tracing::info!("production mode: development bypass disabled");
    } else {
        tracing::warn!("development mode: X-Dev-Impersonate and /v1/dev routes are enabled");
    }
    if config.super_admins.is_empty() {
        tracing::warn!("SUPER_ADMIN_EMAILS is empty; no account will be promoted automatically");
    }

    let pool = create_pool(DatabaseConfig::from_url(
        config.database.url.clone(),
        config.database.max_connections,
    ))
    .await?;
    run_migrations(&pool).await?;

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
