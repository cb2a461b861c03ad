//! Fabric compiler: ingests a declarative spine/leaf topology into a
//! normalized store and renders per-device interface and underlay BGP
//! configuration from it.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod fabric;
pub mod handlers;
pub mod loader;
pub mod models;
pub mod netbox;
pub mod render;
pub mod router;
pub mod utils;

use std::sync::Arc;
use tokio::signal;

use config::Config;
use db::TopologyStore;
use loader::TopologyLoader;
use render::{Compiler, ConfigRenderer};

/// Application state shared across handlers and CLI commands
pub struct AppState {
    pub store: Arc<dyn TopologyStore>,
    pub config: Config,
    pub compiler: Compiler,
    pub loader: TopologyLoader,
}

impl AppState {
    pub fn new(store: Arc<dyn TopologyStore>, config: Config) -> anyhow::Result<Self> {
        let renderer = Arc::new(ConfigRenderer::from_config(&config)?);
        let loader = TopologyLoader::new(renderer.resolver().clone());
        let compiler = Compiler::new(renderer, config.render_workers);
        Ok(Self {
            store,
            config,
            compiler,
            loader,
        })
    }
}

/// Run the HTTP API until Ctrl+C or SIGTERM
pub async fn serve(state: Arc<AppState>, listen_addr: &str) -> anyhow::Result<()> {
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("Fabric compiler listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Fabric compiler shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::MemoryStore;

    /// State over an empty in-memory store with default settings
    pub fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Arc::new(MemoryStore::new()), Config::default()).unwrap())
    }
}
