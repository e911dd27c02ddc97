use std::net::SocketAddr;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod accounts;
mod auth;
mod bootstrap;
mod config;
mod db;
mod error;
mod routes;
mod state;
mod tickets;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repairdesk_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!(
        "Starting repairdesk server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Initialize database
    let db = db::Database::connect(&config.database.url).await?;
    db.run_migrations().await?;
    tracing::info!("Database ready at {}", config.database.url);

    bootstrap::ensure_accounts(&db, &config.seed, &config.auth).await?;

    // Create app state
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(db, config);

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
