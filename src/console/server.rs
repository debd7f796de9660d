//! Console HTTP Server
//!
//! Axum-based server with session resolution, route gating and graceful
//! shutdown.

use crate::console::api::api_router;
use crate::console::config::ConsoleConfig;
use crate::console::pages::pages_router;
use crate::console::{auth_router, route_access_middleware, session_middleware, ConsoleState};
use axum::{middleware, Router};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Console server
pub struct ConsoleServer {
    config: ConsoleConfig,
    state: ConsoleState,
}

impl ConsoleServer {
    /// Create a new console server
    pub fn new(config: ConsoleConfig, state: ConsoleState) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes and middleware
    ///
    /// Layers run outside-in: session resolution, then route access, then
    /// the handler.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .merge(pages_router())
            .nest("/auth", auth_router())
            .nest("/api", api_router())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                route_access_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                session_middleware,
            ))
            .with_state(self.state.clone());

        // Add request logging if enabled
        if self.config.log_requests {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start the server and run until shutdown signal
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.socket_addr();
        let router = self.build_router();

        info!("Starting console server on {}", addr);
        info!(backend = %self.state.api.base_url(), "Proxying backend API");

        if !self.config.is_localhost() && !self.config.secure_cookies {
            warn!(
                "Console bound to {} with insecure cookies - terminate TLS in front of it",
                addr
            );
        }

        info!("Console available at {}", self.config.base_url());

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Console server shut down gracefully");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Get the shared state
    pub fn state(&self) -> &ConsoleState {
        &self.state
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
