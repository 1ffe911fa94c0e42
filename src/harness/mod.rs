//! Serving harnesses: the concurrency models that drive the router.
//!
//! Every harness serves routers produced by the same
//! [`RouterFactory`](crate::server::RouterFactory); only scheduling
//! differs.
//!
//! - [`blocking`] -- single-threaded and thread-pool serving: each OS
//!   thread accepts one connection and serves it to completion before
//!   accepting the next.
//! - [`cooperative`] -- one OS thread, one current-thread Tokio runtime,
//!   one task per connection.
//! - [`process`] -- a supervisor that runs N copies of this executable,
//!   each hosting a thread pool on a shared `SO_REUSEPORT` address.
//!
//! In-process harnesses are started with [`start`] and stopped with
//! [`Harness::shutdown`]. The process pool is driven by
//! [`process::supervise`] instead because it owns no listener itself.

pub mod blocking;
pub mod cooperative;
pub mod process;

use std::net::SocketAddr;
use std::thread::JoinHandle;

use tokio::sync::{mpsc, watch};

use crate::config::model::{Limits, Strategy};
use crate::error::RelayError;
use crate::server::RouterFactory;

/// A serving thread and the name it logs under.
struct Worker {
    name: String,
    handle: JoinHandle<Result<(), RelayError>>,
}

/// Reports a worker thread's exit, including exit by panic.
struct ExitNotice {
    name: String,
    exits: mpsc::UnboundedSender<String>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.exits.send(std::mem::take(&mut self.name));
    }
}

fn spawn_worker<F>(
    name: String,
    exits: &mpsc::UnboundedSender<String>,
    body: F,
) -> Result<Worker, RelayError>
where
    F: FnOnce() -> Result<(), RelayError> + Send + 'static,
{
    let notice = ExitNotice {
        name: name.clone(),
        exits: exits.clone(),
    };
    let handle = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _notice = notice;
            body()
        })?;
    Ok(Worker { name, handle })
}

fn current_thread_runtime() -> Result<tokio::runtime::Runtime, RelayError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// A running in-process harness.
pub struct Harness {
    strategy: &'static str,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    exits: mpsc::UnboundedReceiver<String>,
    workers: Vec<Worker>,
}

/// Start serving `listener` with the given strategy.
///
/// The listener must already be bound and non-blocking (see
/// [`bind_listener`](crate::server::bind_listener)).
pub fn start(
    strategy: &Strategy,
    limits: &Limits,
    listener: std::net::TcpListener,
    make_router: RouterFactory,
) -> Result<Harness, RelayError> {
    let local_addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (exits_tx, exits) = mpsc::unbounded_channel();
    let header_read_timeout = limits.header_read_timeout();

    let workers = match *strategy {
        Strategy::SingleThreaded => {
            blocking::spawn_pool(
                listener,
                1,
                header_read_timeout,
                &make_router,
                &shutdown_rx,
                &exits_tx,
            )?
        }
        Strategy::ThreadPool { threads } => blocking::spawn_pool(
            listener,
            threads,
            header_read_timeout,
            &make_router,
            &shutdown_rx,
            &exits_tx,
        )?,
        Strategy::Cooperative => vec![cooperative::spawn(
            listener,
            make_router,
            shutdown_rx,
            &exits_tx,
        )?],
        Strategy::ProcessPool { .. } => {
            return Err(RelayError::UnsupportedStrategy(strategy.name()));
        }
    };

    tracing::debug!(
        strategy = strategy.name(),
        workers = workers.len(),
        addr = %local_addr,
        "harness started"
    );

    Ok(Harness {
        strategy: strategy.name(),
        local_addr,
        shutdown_tx,
        exits,
        workers,
    })
}

impl Harness {
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Resolves with a worker's name as soon as any worker thread exits.
    ///
    /// Workers only exit on their own after a fatal error or a panic.
    pub async fn worker_exited(&mut self) -> Option<String> {
        self.exits.recv().await
    }

    /// Stop accepting, let in-flight connections finish, join every worker.
    pub async fn shutdown(self) -> Result<(), RelayError> {
        let _ = self.shutdown_tx.send(true);
        let strategy = self.strategy;
        let workers = self.workers;

        tokio::task::spawn_blocking(move || join_all(workers))
            .await
            .map_err(|e| RelayError::WorkerPanicked {
                worker: format!("{strategy} join task: {e}"),
            })??;

        tracing::debug!(strategy, "harness stopped");
        Ok(())
    }
}

fn join_all(workers: Vec<Worker>) -> Result<(), RelayError> {
    let mut first_error = None;
    for worker in workers {
        let outcome = match worker.handle.join() {
            Ok(result) => result,
            Err(_) => Err(RelayError::WorkerPanicked {
                worker: worker.name.clone(),
            }),
        };
        if let Err(e) = outcome {
            tracing::error!(worker = %worker.name, error = %e, "worker failed");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
