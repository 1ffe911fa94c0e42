//! `slowrelay worker` — one member of a process pool.
//!
//! Started by the process-pool supervisor, never by hand. Reads the
//! supervisor's resolved config from the environment, binds the shared
//! address with `SO_REUSEPORT` and serves it with a thread pool until it
//! receives SIGTERM / Ctrl+C or its stdin (held by the supervisor) closes.

use std::io::Read;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::cli::WorkerArgs;
use crate::config::model::Strategy;
use crate::config::{sources, LoadedConfig};
use crate::error::RelayError;
use crate::harness;
use crate::logging;
use crate::server::{self, Stats};

pub async fn execute(args: WorkerArgs) -> Result<(), RelayError> {
    logging::init(&args.log);

    let config = sources::from_worker_env()?;
    let threads = match config.strategy {
        Strategy::ProcessPool { threads, .. } => threads,
        ref other => return Err(RelayError::UnsupportedStrategy(other.name())),
    };
    let loaded = Arc::new(LoadedConfig::new(config, "supervisor")?);
    let addr = loaded.config.listen_addr()?;

    let listener = server::bind_listener(addr, loaded.config.limits.backlog, true)?;
    let make_router = server::router_factory(Arc::clone(&loaded), Arc::new(Stats::new()));
    let mut harness = harness::start(
        &Strategy::ThreadPool { threads },
        &loaded.config.limits,
        listener,
        make_router,
    )?;

    tracing::info!(
        worker = args.index,
        pid = std::process::id(),
        addr = %addr,
        threads,
        "worker started"
    );

    let supervisor_gone = watch_stdin();
    tokio::select! {
        () = server::shutdown_signal() => {}
        _ = supervisor_gone => tracing::info!(worker = args.index, "supervisor closed stdin"),
        exited = harness.worker_exited() => tracing::error!(
            worker = args.index,
            thread = exited.as_deref().unwrap_or("unknown"),
            "serving thread exited unexpectedly"
        ),
    }

    harness.shutdown().await?;
    tracing::info!(worker = args.index, "worker stopped");
    Ok(())
}

/// Resolves once stdin reaches EOF.
///
/// Uses a plain thread: a blocking read parked in Tokio's blocking pool
/// would keep the runtime from shutting down.
fn watch_stdin() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 64];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = tx.send(());
    });
    rx
}
