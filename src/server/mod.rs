//! HTTP server components
//!
//! This module provides the HTTP front end:
//! - Dispatch of requests to the composed repositories
//! - Router with the health endpoint and the repository fallback
//! - Request logging middleware
//! - Server lifecycle management

pub mod dispatch;
pub mod middleware;
pub mod router;

pub use dispatch::RepositorySlices;
pub use middleware::logging_middleware;
pub use router::{build_router, AppState, HealthResponse};

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// HTTP server
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        )
    }

    /// Run the server until `shutdown` resolves
    ///
    /// In-flight requests are completed before this returns.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let app = build_router(self.state).layer(tower_http::trace::TraceLayer::new_for_http());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
