use std::time::Duration;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use campdesk::{build_router, AppState, Config};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // 1. Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    // 2. Configuration
    let config = Config::from_env()?;
    if config.dev_mode {
        warn!("DEV_MODE is on: the dev_user_id cookie is accepted without a token");
    }

    // 3. Database and migrations
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database ready");

    // 4. Router
    let addr = config.bind_addr()?;
    let app = build_router(AppState::new(pool, config));

    // 5. Serve, falling back to the next port if the configured one is taken
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let mut fallback = addr;
            fallback.set_port(addr.port().saturating_add(1));
            warn!(%addr, %fallback, error = %e, "could not bind, trying fallback port");
            tokio::net::TcpListener::bind(fallback).await?
        }
    };

    let bound_addr = listener.local_addr()?;
    info!(
        build = env!("CAMPDESK_BUILD_ID"),
        "server listening on http://{}", bound_addr
    );
    info!("sign in at http://{}/login", bound_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
