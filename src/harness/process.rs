//! Process-pool supervision.
//!
//! The supervisor re-executes the current binary once per pool slot as
//! `slowrelay worker --index <i>`, handing over the already-resolved
//! config through [`WORKER_CONFIG_ENV`]. Each worker binds the listen
//! address with `SO_REUSEPORT` and runs its own thread pool, so a crash
//! only takes down one process. The supervisor:
//!
//! - restarts a worker that exits on its own, after [`RESTART_BACKOFF`];
//! - gives up on a slot after [`MAX_FAST_FAILURES`] consecutive exits
//!   within [`STARTUP_GRACE`] of spawning (e.g. the port is taken);
//! - stops workers by closing their stdin, killing any worker still alive
//!   after [`STOP_GRACE`].
//!
//! Workers also exit when their stdin closes because the supervisor died.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::model::ServerConfig;
use crate::config::sources::{self, WORKER_CONFIG_ENV};
use crate::error::RelayError;

pub const RESTART_BACKOFF: Duration = Duration::from_secs(1);
pub const STARTUP_GRACE: Duration = Duration::from_secs(2);
pub const MAX_FAST_FAILURES: u32 = 5;
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// How to launch one pool worker.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub exe: PathBuf,
    /// Arguments before the trailing `--index <i>`.
    pub args: Vec<String>,
    pub config_json: String,
}

impl WorkerCommand {
    /// Launch workers from the running executable.
    pub fn current(config: &ServerConfig, log_args: Vec<String>) -> Result<Self, RelayError> {
        let mut args = vec!["worker".to_string()];
        args.extend(log_args);
        Ok(Self {
            exe: std::env::current_exe()?,
            args,
            config_json: sources::to_worker_env(config)?,
        })
    }

    fn spawn(&self, index: usize) -> Result<Child, RelayError> {
        Ok(Command::new(&self.exe)
            .args(&self.args)
            .arg("--index")
            .arg(index.to_string())
            .env(WORKER_CONFIG_ENV, &self.config_json)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?)
    }
}

/// Run `processes` workers until `shutdown` resolves or a slot gives up.
pub async fn supervise<F>(
    command: WorkerCommand,
    processes: usize,
    shutdown: F,
) -> Result<(), RelayError>
where
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut slots = JoinSet::new();
    for index in 0..processes {
        slots.spawn(run_slot(index, command.clone(), stop_rx.clone()));
    }

    tokio::pin!(shutdown);
    let mut outcome = Ok(());
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            joined = slots.join_next() => match joined {
                None => break,
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => {
                    tracing::error!(error = %e, "worker slot failed, stopping pool");
                    outcome = Err(e);
                    break;
                }
                Some(Err(join_err)) => {
                    outcome = Err(RelayError::WorkerPanicked {
                        worker: format!("supervisor slot: {join_err}"),
                    });
                    break;
                }
            }
        }
    }

    let _ = stop_tx.send(true);
    while let Some(joined) = slots.join_next().await {
        if let Ok(Err(e)) = joined {
            tracing::warn!(error = %e, "worker slot stopped with error");
        }
    }
    outcome
}

async fn run_slot(
    index: usize,
    command: WorkerCommand,
    mut stop: watch::Receiver<bool>,
) -> Result<(), RelayError> {
    let mut fast_failures = 0u32;

    loop {
        if *stop.borrow() {
            return Ok(());
        }

        let started = Instant::now();
        let mut child = command.spawn(index)?;
        let stdin = child.stdin.take();
        let pid = child.id();
        tracing::info!(worker = index, pid, "worker spawned");

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = stop.changed() => None,
        };
        let Some(status) = exited else {
            stop_child(index, child, stdin).await;
            return Ok(());
        };
        drop(stdin);
        let status = status?;

        if *stop.borrow() {
            return Ok(());
        }

        if started.elapsed() < STARTUP_GRACE {
            fast_failures += 1;
        } else {
            fast_failures = 0;
        }
        tracing::warn!(
            worker = index,
            pid,
            status = %status,
            fast_failures,
            "worker exited unexpectedly"
        );
        if fast_failures >= MAX_FAST_FAILURES {
            return Err(RelayError::WorkerCrashLoop {
                worker: index,
                failures: fast_failures,
            });
        }

        tokio::select! {
            () = tokio::time::sleep(RESTART_BACKOFF) => {}
            _ = stop.changed() => return Ok(()),
        }
    }
}

async fn stop_child(index: usize, mut child: Child, stdin: Option<ChildStdin>) {
    // EOF on stdin is the worker's stop request.
    drop(stdin);
    match tokio::time::timeout(STOP_GRACE, child.wait()).await {
        Ok(Ok(status)) => tracing::info!(worker = index, status = %status, "worker stopped"),
        Ok(Err(e)) => tracing::warn!(worker = index, error = %e, "failed to reap worker"),
        Err(_) => {
            tracing::warn!(worker = index, "worker ignored stop request, killing");
            if let Err(e) = child.kill().await {
                tracing::warn!(worker = index, error = %e, "failed to kill worker");
            }
        }
    }
}
