use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use registration::config::AppConfig;
use registration::database;
use registration::web::{build_router, AppState};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;

    info!("Connecting to database: {}", config.database_url);
    let pool = database::connect(&config.database_url).await?;

    if config.auth.api_url.is_none() && config.auth.admin_password.is_none() {
        warn!("⚠️  Neither AUTH_API_URL nor ADMIN_EMAIL/ADMIN_PASSWORD is set, admin login is disabled");
    }
    if config.email.api_key.is_none() {
        warn!("⚠️  RESEND_API_KEY is not set, confirmation emails will fail");
    }

    let state = AppState::new(pool, config);

    // Expired sessions are signed out even when nobody visits again.
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let ended = sessions.purge_expired().await;
            if ended > 0 {
                let active = sessions.len().await;
                info!(ended, active, "Expired admin sessions signed out");
            }
        }
    });

    let app = build_router(state);

    // Fallback port when the configured one is taken
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback = SocketAddr::new(addr.ip(), addr.port().saturating_add(1));
            warn!("⚠️  Could not bind {}: {}. Trying fallback {}", addr, e, fallback);
            tokio::net::TcpListener::bind(fallback).await?
        }
    };

    let bound_addr = listener.local_addr()?;
    info!(
        build = env!("USM_BUILD_ID"),
        schema = env!("USM_SCHEMA_VERSION"),
        "🚀 Server running on http://{}",
        bound_addr
    );
    info!("📍 Registration form at http://{}/, admin at http://{}/admin", bound_addr, bound_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
