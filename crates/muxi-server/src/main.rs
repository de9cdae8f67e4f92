use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use muxi_core::LocalImageStore;
use muxi_db::{Database, DatabaseConfig};
use muxi_server::auth::JwtKeys;
use muxi_server::config::ServerConfig;
use muxi_server::layers::{cors_layer, with_rate_limit};
use muxi_server::routes;
use muxi_server::seed::ensure_admin;
use muxi_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("muxi=info".parse()?))
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    match &config.admin_password {
        Some(password) => {
            ensure_admin(&db, &config.admin_username, password).await?;
        }
        None => tracing::warn!("ADMIN_PASSWORD not set, skipping admin account seeding"),
    }

    let jwt = match &config.jwt_secret {
        Some(secret) => JwtKeys::from_secret(secret)?,
        None => {
            tracing::warn!("JWT_SECRET not set, using a random secret; tokens will not survive a restart");
            JwtKeys::random()
        }
    };

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let images = LocalImageStore::new(config.upload_dir.clone());

    let state = Arc::new(AppState { db, jwt, images });

    if config.trust_proxy_headers {
        tracing::info!("Rate limiting by client IP from proxy headers");
    }
    let app = with_rate_limit(
        routes::router(state),
        config.rate_limit_per_second,
        config.trust_proxy_headers,
    )?
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
