//! HTTP status server
//!
//! Exposes read-only views of the running monitor next to the Prometheus
//! scrape endpoint.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::scheduler::Monitor;

pub use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The monitor whose tracker and sources are reported
    pub monitor: Arc<Monitor>,

    /// Server start time
    pub start_time: Instant,
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

// ============================================================================
// Status Server
// ============================================================================

/// HTTP server over a shared [`Monitor`]
pub struct StatusServer {
    bind_address: SocketAddr,
    state: AppState,
}

impl StatusServer {
    pub fn new(config: &ServerConfig, monitor: Arc<Monitor>) -> Result<Self, ServerError> {
        let bind_address =
            config
                .bind_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
                    addr: config.bind_addr.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            bind_address,
            state: AppState {
                monitor,
                start_time: Instant::now(),
            },
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Build the router with all routes and layers
    pub fn build_router(&self) -> Router {
        create_router(self.state.clone())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(%addr, "Status server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Status server shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bind_address() {
        let store = Arc::new(crate::storage::TrendStore::in_memory().unwrap());
        let monitor = Arc::new(
            Monitor::new(
                crate::config::Config::default(),
                store,
                Arc::new(crate::notifications::NotificationManager::new()),
            )
            .unwrap(),
        );

        let config = ServerConfig {
            enabled: true,
            bind_addr: "not-an-address".into(),
        };
        assert!(matches!(
            StatusServer::new(&config, Arc::clone(&monitor)),
            Err(ServerError::InvalidAddress { .. })
        ));

        let server = StatusServer::new(&ServerConfig::default(), monitor).unwrap();
        assert_eq!(server.bind_address().port(), 8080);
    }
}
