//! `slowrelay health` — check the health of a running instance.
//!
//! Sends a `GET /health` request to the specified URL and displays
//! the response as formatted text or raw JSON. Under the process pool
//! the answer comes from whichever worker accepted the connection.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;

use crate::cli::HealthArgs;
use crate::error::RelayError;
use crate::health::HealthResponse;
use crate::server;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

fn request_error(e: impl std::error::Error + Send + Sync + 'static) -> RelayError {
    RelayError::HttpRequest {
        source: Box::new(e),
    }
}

/// `GET <base>/health` through the same client the relay uses upstream.
async fn fetch(base: &str) -> Result<(StatusCode, Bytes), RelayError> {
    let uri: hyper::Uri = format!("{}/health", base.trim_end_matches('/'))
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| RelayError::UriParse {
            source: Box::new(e),
        })?;
    let request = hyper::Request::get(uri)
        .body(Full::new(Bytes::new()))
        .map_err(request_error)?;

    let client = server::build_http_client(HEALTH_TIMEOUT);
    let exchange = async {
        let response = client.request(request).await.map_err(request_error)?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(request_error)?
            .to_bytes();
        Ok::<_, RelayError>((status, body))
    };

    tokio::time::timeout(HEALTH_TIMEOUT, exchange)
        .await
        .map_err(|_| RelayError::HttpRequest {
            source: format!("health check timed out after {}s", HEALTH_TIMEOUT.as_secs()).into(),
        })?
}

pub async fn execute(args: HealthArgs) -> Result<(), RelayError> {
    let (status, body) = fetch(&args.url).await?;

    if !status.is_success() {
        return Err(RelayError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) => {
            println!("\u{2713} slowrelay is healthy ({})", args.url);
            println!("  version:        {} ({})", health.version, health.git);
            println!("  pid:            {}", health.pid);
            println!("  uptime:         {}", format_uptime(health.uptime_seconds));
            println!("  strategy:       {}", health.strategy);
            println!(
                "  config:         {} (digest {})",
                health.config.source, health.config.digest
            );
            println!(
                "  upstream:       {} (timeout {}ms)",
                health.config.upstream, health.config.timeout_ms
            );
            println!(
                "  requests:       {} forwarded, {} failed, {} in flight",
                health.stats.requests_forwarded,
                health.stats.requests_failed,
                health.stats.requests_in_flight
            );
        }
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
