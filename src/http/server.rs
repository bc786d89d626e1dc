//! HTTP server implementation.

use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::handlers::{self, AppState};
use super::key::ClientKeyExtractor;
use super::middleware::{rate_limit_middleware, RateLimitState};
use crate::error::{HostwatchError, Result};
use crate::ratelimit::RateLimiterBackend;
use crate::telemetry::HostProbe;

/// Build the telemetry router with every route behind the rate limiter.
pub fn router(
    probe: Arc<HostProbe>,
    limiter: Arc<dyn RateLimiterBackend>,
    extractor: ClientKeyExtractor,
) -> Router {
    let app_state = AppState::new(probe, Arc::clone(&limiter));
    let rate_limit_state = RateLimitState::new(limiter, extractor);

    Router::new()
        .route("/mem", get(handlers::memory))
        .route("/disk", get(handlers::disks))
        .route("/cpu/percent", get(handlers::cpu_percent))
        .route("/cpu/info", get(handlers::cpu_info))
        .route("/system", get(handlers::system))
        .route("/load", get(handlers::load))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .with_state(app_state)
        .layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit_middleware,
        ))
}

/// HTTP server for the telemetry endpoints.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The routes to serve
    app: Router,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, app: Router) -> Self {
        Self { addr, app }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            HostwatchError::Io(e)
        })?;

        info!(
            addr = %self.addr,
            "Starting HTTP server with graceful shutdown"
        );

        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            HostwatchError::Io(e)
        })
    }
}
