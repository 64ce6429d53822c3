//! HTTP front door
//!
//! Serves exactly two read-only routes, `/playlist` and `/health`. Every other
//! path or method gets a 404. Nothing here can start a cycle; handlers only
//! read the publication store and the cycle tracker.

mod handlers;

pub use handlers::{ENTRY_COUNT_HEADER, GENERATED_AT_HEADER};

use crate::config::ServerConfig;
use crate::cycle::CycleTracker;
use crate::playlist::PublicationStore;
use crate::AggregatorError;
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// State shared with every handler
#[derive(Clone)]
pub struct AppState {
    pub store: PublicationStore,
    pub tracker: Arc<CycleTracker>,

    /// How long a cycle may stay in progress before `/health` fails
    pub stuck_after: Duration,
}

/// Builds the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/playlist",
            get(handlers::playlist).fallback(handlers::not_found),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Resolves the configured listen address
pub fn listen_addr(config: &ServerConfig) -> crate::Result<SocketAddr> {
    let ip: IpAddr = config.bind_address.parse().map_err(|_| {
        crate::ConfigError::Validation(format!("invalid bind-address {}", config.bind_address))
    })?;
    Ok(SocketAddr::new(ip, config.port))
}

/// Binds the listener
pub async fn bind(addr: SocketAddr) -> crate::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| AggregatorError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serves `app` on `listener` until `shutdown` resolves
pub async fn serve<S>(listener: TcpListener, app: Router, shutdown: S) -> crate::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AggregatorError::Server(e.to_string()))
}
