//! Router construction, per-worker application state and socket setup.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the frozen config,
//! the worker's HTTP client, stats and uptime), [`build_router`] for
//! constructing the Axum router with middleware layers, [`router_factory`]
//! which every harness uses to build one router per worker,
//! [`build_http_client`] for the connection-pooled hyper client,
//! [`bind_listener`] for the listening socket and [`shutdown_signal`] for
//! SIGTERM / Ctrl+C handling.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use socket2::{Domain, Protocol, Socket, Type};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::LoadedConfig;
use crate::error::{ForwardError, RelayError};
use crate::health::health_handler;
use crate::proxy;

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub in_flight: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
        }
    }

    /// Count a request as in flight until the returned guard is dropped.
    #[must_use]
    pub fn track(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight(self)
    }
}

pub struct InFlight<'a>(&'a Stats);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub loaded: Arc<LoadedConfig>,
    pub http_client: HttpClient,
    pub start_time: Instant,
    pub stats: Arc<Stats>,
}

impl AppState {
    #[must_use]
    pub fn new(loaded: Arc<LoadedConfig>, stats: Arc<Stats>, start_time: Instant) -> Self {
        let idle = Duration::from_secs(loaded.config.upstream.pool_idle_timeout);
        Self {
            http_client: build_http_client(idle),
            loaded,
            start_time,
            stats,
        }
    }
}

#[must_use]
pub fn build_http_client(pool_idle_timeout: Duration) -> HttpClient {
    // When multiple rustls crypto providers are compiled in (e.g. `--all-features`
    // pulls in sentry's TLS stack), rustls cannot auto-detect which one to use.
    // Explicitly install `ring` as the default provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(pool_idle_timeout)
        .build(https)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let max_body = state.loaded.config.limits.max_body;
    Router::new()
        .route("/", get(proxy::forward_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "handler panicked");
    ForwardError::InternalFault(format!("handler panicked: {detail}")).into_response()
}

/// Builds a fresh router (and HTTP client) for each worker.
///
/// Every harness calls this from the thread that will drive the router, so
/// pooled upstream connections stay on the runtime that created them.
pub type RouterFactory = Arc<dyn Fn() -> Router + Send + Sync>;

#[must_use]
pub fn router_factory(loaded: Arc<LoadedConfig>, stats: Arc<Stats>) -> RouterFactory {
    let start_time = Instant::now();
    Arc::new(move || {
        let state = AppState::new(Arc::clone(&loaded), Arc::clone(&stats), start_time);
        build_router(Arc::new(state))
    })
}

/// Bind a non-blocking listening socket.
///
/// `reuse_port` lets several worker processes bind the same address and
/// have the kernel spread incoming connections between them.
pub fn bind_listener(
    addr: SocketAddr,
    backlog: u32,
    reuse_port: bool,
) -> Result<std::net::TcpListener, RelayError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    if reuse_port {
        socket.set_reuse_port(true)?;
    }
    #[cfg(not(unix))]
    let _ = reuse_port;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_guard_releases_on_drop() {
        let stats = Stats::new();
        {
            let _a = stats.track();
            let _b = stats.track();
            assert_eq!(stats.in_flight.load(Ordering::Relaxed), 2);
        }
        assert_eq!(stats.in_flight.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn panic_payloads_become_internal_faults() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn reuse_port_listeners_share_an_address() {
        let first = bind_listener("127.0.0.1:0".parse().unwrap(), 16, true).unwrap();
        let addr = first.local_addr().unwrap();
        #[cfg(unix)]
        {
            let second = bind_listener(addr, 16, true).unwrap();
            assert_eq!(second.local_addr().unwrap(), addr);
        }
    }
}
