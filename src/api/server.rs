//! API Server
//!
//! Runs the REST server for the inventory gateway.

use crate::cache::InventoryCacheRef;
use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::{error, info};

use super::rest::{RestConfig, RestRouter};

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
    /// Handler settings
    pub rest: RestConfig,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
            rest: RestConfig::default(),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// REST API server with broadcast-driven graceful shutdown
pub struct ApiServer {
    config: ApiServerConfig,
    cache: InventoryCacheRef,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, cache: InventoryCacheRef) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            cache,
            shutdown_tx,
        }
    }

    /// Run the API server until it fails or is shut down
    pub async fn run(&self) -> Result<()> {
        info!("Starting inventory API server");
        info!("  REST API: {}", self.config.rest_addr);

        match self.spawn_rest_server().await {
            Ok(result) => result,
            Err(e) => {
                error!("REST server task failed: {:?}", e);
                Err(Error::Internal(format!("REST server task failed: {}", e)))
            }
        }
    }

    fn spawn_rest_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let addr = self.config.rest_addr;
        let router = RestRouter::new(self.cache.clone(), self.config.rest.clone());
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move { run_rest_server(addr, router, shutdown_rx).await })
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Handle for triggering shutdown from another task
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

async fn run_rest_server(
    addr: SocketAddr,
    router: RestRouter,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let app = router.build();

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        Error::Internal(format!("Failed to bind REST server on {}: {}", addr, e))
    })?;

    info!("REST API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("REST server shutting down");
        })
        .await
        .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

    Ok(())
}
