use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ambient_service::{
    api,
    config::Config,
    db::{self, MemoryStore, OccupantStore, PgStore, PresenceLog},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; env vars may be set externally.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let (occupants, presence_log): (Arc<dyn OccupantStore>, Arc<dyn PresenceLog>) =
        match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections).await?;
                db::run_migrations(&pool).await?;
                info!("Database ready");
                let store = Arc::new(PgStore::new(pool));
                (store.clone() as Arc<dyn OccupantStore>, store as Arc<dyn PresenceLog>)
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory personnel store");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn OccupantStore>, store as Arc<dyn PresenceLog>)
            }
        };

    // Telemetry, climate and lighting state live only in this process.
    let state = AppState::new(occupants, presence_log, config.store_timeout);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, store_timeout_ms = config.store_timeout.as_millis() as u64, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
