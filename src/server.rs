//! HTTP server for the blob adapter.

use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::router::{create_router, AppState};
use crate::storage::{AzureConnector, MemoryBlobStore, MemoryConnector, StoreConnector};

/// Blob adapter server.
pub struct AdapterServer {
    config: Arc<Config>,
    connector: Arc<dyn StoreConnector>,
}

impl AdapterServer {
    /// Creates a server backed by the configured storage.
    pub fn new(config: Config) -> Self {
        let connector: Arc<dyn StoreConnector> = if config.in_memory {
            Arc::new(MemoryConnector::new(Arc::new(MemoryBlobStore::new(
                config.container.clone(),
            ))))
        } else {
            Arc::new(AzureConnector::new())
        };

        Self::with_connector(config, connector)
    }

    /// Creates a server with a custom storage connector.
    pub fn with_connector(config: Config, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Returns the application router with middleware attached.
    pub fn router(&self) -> axum::Router {
        let state = AppState {
            config: self.config.clone(),
            connector: self.connector.clone(),
        };

        create_router(state).layer(TraceLayer::new_for_http())
    }

    /// Binds the configured address and serves until interrupted.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.bind_address()).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until interrupted.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = listener.local_addr()?;
        info!(
            container = %self.config.container,
            account = %self.config.account.name,
            in_memory = self.config.in_memory,
            "blob adapter listening at http://{}/azblob",
            addr
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("blob adapter stopped");
        Ok(())
    }

    /// Returns the bind address.
    pub fn bind_address(&self) -> String {
        self.config.bind_address()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
