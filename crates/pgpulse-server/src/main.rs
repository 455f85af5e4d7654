//! # pgpulse server
//!
//! Loads configuration, builds the shared PostgreSQL pool and serves
//! `GET /api/status` until the process is stopped.

use pgpulse_api::{AppState, build_router};
use pgpulse_common::config::{self, AppConfig, LogFormat};
use pgpulse_db::PgStatusPool;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = config::load_env();

    // Initialize tracing (structured logging) before sanitising, so a dropped
    // PGSSLMODE is reported.
    init_tracing(LogFormat::from_snapshot(&env)?);

    // Load configuration
    let config = AppConfig::from_env(&env.sanitized())?;

    tracing::info!("Starting pgpulse v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(mode = ?config.server.mode, "Deployment mode");

    // One pool for the life of the process; connections open on demand.
    let pool = PgStatusPool::connect_lazy(&config.database, &config.pool);

    let router = build_router(AppState::new(pool, config.server.mode));
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    tracing::info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pgpulse=debug,tower_http=debug".into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
