//! `slowrelay slow-api` — run the slow upstream simulator.

use std::net::SocketAddr;

use crate::cli::SlowApiArgs;
use crate::error::RelayError;
use crate::{logging, server, slow_api};

pub async fn execute(args: SlowApiArgs) -> Result<(), RelayError> {
    logging::init(&args.log);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "slow api started");

    axum::serve(listener, slow_api::build_router())
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    tracing::info!("slow api stopped");
    Ok(())
}
