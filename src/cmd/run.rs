//! `slowrelay run` — start the forwarding service.
//!
//! Resolves the configuration once, then hands the frozen config to the
//! harness selected by its strategy: an in-process harness bound to the
//! listen address, or the process-pool supervisor. Runs until SIGTERM /
//! Ctrl+C, or until a serving thread dies.

use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::model::Strategy;
use crate::config::{self, Overrides};
use crate::error::RelayError;
use crate::harness::{self, process};
use crate::logging;
use crate::server::{self, Stats};

pub async fn execute(args: RunArgs) -> Result<(), RelayError> {
    let log_format = logging::init(&args.log);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let overrides = Overrides::from(&args);
    let loaded = Arc::new(config::resolve(args.config.as_deref(), &overrides).await?);
    let config = Arc::clone(&loaded.config);
    let addr = config.listen_addr()?;

    tracing::info!(
        addr = %addr,
        upstream = %config.upstream.url,
        timeout_ms = config.upstream.timeout,
        strategy = %config.strategy.describe(),
        source = %loaded.source_name,
        digest = loaded.short_digest(),
        "slowrelay starting"
    );

    match &config.strategy {
        Strategy::ProcessPool { processes, .. } => {
            let command =
                process::WorkerCommand::current(&config, args.log.to_worker_args(log_format))?;
            process::supervise(command, *processes, server::shutdown_signal()).await?;
        }
        strategy => {
            let listener = server::bind_listener(addr, config.limits.backlog, false)?;
            let stats = Arc::new(Stats::new());
            let make_router = server::router_factory(Arc::clone(&loaded), stats);
            let mut harness = harness::start(strategy, &config.limits, listener, make_router)?;

            tracing::info!(
                addr = %harness.local_addr(),
                workers = harness.worker_count(),
                "slowrelay started"
            );

            tokio::select! {
                () = server::shutdown_signal() => {}
                exited = harness.worker_exited() => {
                    tracing::error!(
                        worker = exited.as_deref().unwrap_or("unknown"),
                        "worker exited unexpectedly, shutting down"
                    );
                }
            }

            harness.shutdown().await?;
        }
    }

    tracing::info!("slowrelay stopped");
    Ok(())
}
