//! Cooperative serving: one OS thread multiplexing every connection.
//!
//! A current-thread Tokio runtime hosts `axum::serve`, which spawns one
//! task per connection. Tasks yield at every `.await` in the request path
//! (accept, upstream connect, upstream body, timers), so a slow upstream
//! call parks only its own task. A blocking call anywhere in the handler
//! would stall every connection on this thread.

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use super::{current_thread_runtime, spawn_worker, Worker};
use crate::error::RelayError;
use crate::server::RouterFactory;

pub(super) fn spawn(
    listener: std::net::TcpListener,
    make_router: RouterFactory,
    mut shutdown: watch::Receiver<bool>,
    exits: &mpsc::UnboundedSender<String>,
) -> Result<Worker, RelayError> {
    spawn_worker("relay-cooperative".into(), exits, move || {
        let runtime = current_thread_runtime()?;
        runtime.block_on(async move {
            let listener = TcpListener::from_std(listener)?;
            let router = make_router();
            tracing::debug!("cooperative scheduler accepting");

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await?;

            tracing::debug!("cooperative scheduler stopped");
            Ok::<(), RelayError>(())
        })
    })
}
