//! Broker service.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{Config, ServerConfig};
use crate::file::{ObjectStore, UrlSigner};
use crate::{FileDeckError, Result};

use super::handlers::AppState;
use super::router::create_router;

/// HTTP server for the broker API and signed object locations.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    server_config: ServerConfig,
}

impl WebServer {
    /// Open the object store and prepare the signer.
    pub async fn new(config: &Config) -> Result<Self> {
        config.validate_server()?;
        let server = &config.server;

        let addr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| FileDeckError::Config(format!("invalid listen address: {e}")))?;

        let store = ObjectStore::new(&config.storage.path).await?;
        tracing::info!("Object storage initialized at: {}", config.storage.path);

        let signer = UrlSigner::new(
            &server.signing_secret,
            &server.effective_public_url(),
            server.signed_url_ttl_secs,
        )?;

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(store, signer)),
            server_config: server.clone(),
        })
    }

    /// Get the configured listen address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn router(&self) -> Router {
        create_router(self.app_state.clone(), &self.server_config)
    }

    /// Run the server until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Broker listening on http://{}", listener.local_addr()?);
        tracing::info!(
            "Signed locations issued against {}",
            self.server_config.effective_public_url()
        );

        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Serve in the background and return the bound address.
    ///
    /// Useful for tests binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Broker listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Broker server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
