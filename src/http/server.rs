//! HTTP server for the visit counter.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tracing::{error, info};

use super::handlers::{health_handler, visit_handler, AppState};
use super::page::PageSource;
use crate::config::HEALTH_ROUTE;
use crate::error::Result;
use crate::visits::VisitCounter;

/// Build the application router.
///
/// The visit endpoint is mounted at `route`; `/health` reports store health.
pub fn router(route: &str, state: Arc<AppState>) -> Router {
    Router::new()
        .route(route, get(visit_handler))
        .route(HEALTH_ROUTE, get(health_handler))
        .with_state(state)
}

/// HTTP server exposing the visit counting endpoint.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Path of the visit endpoint
    route: String,
    /// Shared handler state
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, route: impl Into<String>, counter: VisitCounter, page: PageSource) -> Self {
        Self {
            addr,
            route: route.into(),
            state: Arc::new(AppState { counter, page }),
        }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;

        info!(
            addr = %self.addr,
            route = %self.route,
            "Starting HTTP server with graceful shutdown"
        );

        let app = router(&self.route, self.state);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e
        })?;

        Ok(())
    }
}
