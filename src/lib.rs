//! A small voting site: list recent polls, show a poll's choices, take a
//! vote and show the tallies.
//!
//! Pages are rendered server-side with Tera. Persistence goes through the
//! [`store::PollStore`] trait, backed by Postgres when `DATABASE_URL` is set
//! and by an in-memory store otherwise.
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use tokio::signal::{self, ctrl_c};
use tracing::{info, warn};

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod poll;
pub mod routes;
pub mod store;
pub mod templates;

use config::Config;
use db::PgStore;
use store::{MemoryStore, PollStore};
use templates::Templates;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub templates: Templates,
}

impl AppState {
    pub fn new(store: Arc<dyn PollStore>) -> Result<Self, tera::Error> {
        Ok(Self {
            store,
            templates: Templates::new()?,
        })
    }
}

/// Connects the configured store, applying migrations for Postgres.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn PollStore>, Box<dyn std::error::Error>> {
    match &config.database_url {
        Some(url) => {
            info!("Connecting to Postgres...");
            let store = PgStore::connect(url, config.max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, polls are kept in memory and lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = connect_store(&config).await?;
    let state = Arc::new(AppState::new(store)?);
    let app = routes::create_routes(state);

    let address = config.socket_addr()?;
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {address}");
    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
