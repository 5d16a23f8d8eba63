//! PHC portal server

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phc_portal::{
    api::{self, AppState},
    config::Config,
    db,
    services::TokenCodec,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phc_portal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PHC portal...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!(environment = ?config.server.environment, "Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let tokens = if config.auth.token_secret.is_empty() {
        tracing::warn!("auth.token_secret is not set; using an ephemeral secret, sessions end on restart");
        TokenCodec::ephemeral(config.auth.session_ttl_seconds)
    } else {
        TokenCodec::new(
            config.auth.token_secret.as_bytes(),
            config.auth.session_ttl_seconds,
        )
    };

    let state = AppState::new(pool.clone(), &config, tokens);

    // Bootstrap admin account
    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password) {
        let created = state
            .account_service
            .ensure_admin(email, password)
            .await
            .context("Failed to create bootstrap admin")?;
        if created {
            tracing::info!("Bootstrap admin account created: {}", email);
        }
    }

    // Build router
    let app = api::build_router(state, &config);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    pool.close().await;
    Ok(())
}
