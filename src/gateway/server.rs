//! HTTP server

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::auth::AccessGate;
use super::router::{AppState, create_router};
use crate::config::Config;
use crate::store::ItemStore;
use crate::{Error, Result};

/// Item tracking server
pub struct Server {
    /// Configuration
    config: Config,
    /// Store and gate shared with handlers
    state: Arc<AppState>,
}

impl Server {
    /// Create a server: validate config, resolve the gate, build an empty store
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let gate = Arc::new(AccessGate::from_config(&config.auth)?);
        let store = Arc::new(ItemStore::new());

        Ok(Self {
            config,
            state: Arc::new(AppState { store, gate }),
        })
    }

    /// Shared state (store + gate)
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Fully layered router
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state), &self.config.server)
    }

    /// Bind the configured address and serve until Ctrl-C / SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        self.log_banner(local);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!(items = self.state.store.len(), "Server stopped");
        Ok(())
    }

    fn log_banner(&self, local: SocketAddr) {
        let gate = &self.state.gate;

        info!("============================================================");
        info!("ITEMTRACK v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(addr = %local, "Listening");

        if gate.is_enabled() {
            info!(header = %gate.header_name(), "ACCESS GATE enabled");
        } else {
            warn!("ACCESS GATE disabled - item API is open to all requests");
        }

        info!("  GET    http://{local}/api/health");
        info!("  GET    http://{local}/api/items?q=");
        info!("  POST   http://{local}/api/items");
        info!("  POST   http://{local}/api/items/{{id}}/toggle");
        info!("  DELETE http://{local}/api/items/{{id}}");
        if let Some(dir) = &self.config.server.static_dir {
            info!("  GET    http://{local}/  (frontend from {})", dir.display());
        }
        info!("============================================================");
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
