//! Thread-per-connection serving.
//!
//! Each worker thread owns a current-thread runtime and a private router
//! (and therefore a private upstream connection pool). It accepts one
//! connection, serves it with keep-alive disabled so the connection
//! carries exactly one request, and only then accepts the next one. A
//! slow upstream call therefore occupies exactly one thread. The
//! single-threaded strategy is a pool of one.
//!
//! A connection that never delivers its request headers is dropped after
//! the header-read timeout, and shutdown closes a connection that has not
//! started a request yet, so no client can pin a worker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

use super::{current_thread_runtime, spawn_worker, Worker};
use crate::error::RelayError;
use crate::server::RouterFactory;

/// Pause after a failed `accept` (e.g. EMFILE) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub(super) fn spawn_pool(
    listener: std::net::TcpListener,
    threads: usize,
    header_read_timeout: Duration,
    make_router: &RouterFactory,
    shutdown: &watch::Receiver<bool>,
    exits: &mpsc::UnboundedSender<String>,
) -> Result<Vec<Worker>, RelayError> {
    let mut workers = Vec::with_capacity(threads);
    for index in 0..threads {
        let listener = listener.try_clone()?;
        let make_router = Arc::clone(make_router);
        let shutdown = shutdown.clone();
        workers.push(spawn_worker(
            format!("relay-worker-{index}"),
            exits,
            move || {
                serve_blocking(index, listener, header_read_timeout, &make_router, shutdown)
            },
        )?);
    }
    Ok(workers)
}

fn serve_blocking(
    index: usize,
    listener: std::net::TcpListener,
    header_read_timeout: Duration,
    make_router: &RouterFactory,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), RelayError> {
    let runtime = current_thread_runtime()?;
    runtime.block_on(async move {
        let listener = TcpListener::from_std(listener)?;
        let router = make_router();
        tracing::debug!(worker = index, "worker accepting");

        loop {
            if *shutdown.borrow() {
                break;
            }
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(worker = index, error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };
            let connection = Connection {
                worker: index,
                peer,
                header_read_timeout,
            };
            connection
                .serve(stream, router.clone(), &mut shutdown)
                .await;
        }

        tracing::debug!(worker = index, "worker stopped");
        Ok::<(), RelayError>(())
    })
}

struct Connection {
    worker: usize,
    peer: SocketAddr,
    header_read_timeout: Duration,
}

impl Connection {
    /// Serve a single request on `stream`, then close it.
    ///
    /// On shutdown a request already in progress runs to completion; a
    /// connection still waiting for its request is closed.
    async fn serve(
        self,
        stream: TcpStream,
        router: Router,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let service = TowerToHyperService::new(router);
        let conn = hyper::server::conn::http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(self.header_read_timeout)
            .keep_alive(false)
            .serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown.changed() => {
                tracing::debug!(worker = self.worker, peer = %self.peer, "draining connection");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        if let Err(e) = result {
            // Mostly peers hanging up early or never sending headers.
            tracing::debug!(
                worker = self.worker,
                peer = %self.peer,
                error = %e,
                "connection ended with error"
            );
        }
    }
}
