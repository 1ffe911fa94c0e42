//! The forwarding handler.
//!
//! [`forward_handler`] serves `GET /?delay=<n>`: it parses the delay,
//! makes exactly one upstream call through [`upstream::call`] and relays
//! the body as `Hi there! <body>`. Every failure is converted into a
//! response here, at the request boundary. The handler knows nothing
//! about which harness is driving it.

pub mod delay;
pub mod upstream;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::ForwardError;
use crate::server::AppState;
use delay::Delay;

pub const GREETING: &str = "Hi there! ";

/// Propagated to the upstream and echoed back to the caller.
pub const CORRELATION_ID: http::HeaderName = http::HeaderName::from_static("x-correlation-id");

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    req_headers: HeaderMap,
) -> Response {
    let correlation_id = req_headers
        .get(&CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    // Released on drop, including when the caller disconnects mid-flight.
    let _in_flight = state.stats.track();

    let result = forward(&state, query.as_deref(), &correlation_id).await;

    let response = match result {
        Ok(body) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            (StatusCode::OK, body).into_response()
        }
        Err(e) => {
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            match &e {
                ForwardError::InvalidParameter { .. } => tracing::debug!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "rejected request"
                ),
                ForwardError::InternalFault(_) => tracing::error!(
                    correlation_id = %correlation_id,
                    kind = e.kind(),
                    error = %e,
                    "forwarding failed"
                ),
                _ => tracing::warn!(
                    correlation_id = %correlation_id,
                    kind = e.kind(),
                    error = %e,
                    "forwarding failed"
                ),
            }
            e.into_response()
        }
    };

    with_correlation_id(response, &correlation_id)
}

async fn forward(
    state: &AppState,
    query: Option<&str>,
    correlation_id: &str,
) -> Result<String, ForwardError> {
    let delay = Delay::from_query(query)?;
    let upstream = &state.loaded.config.upstream;

    tracing::info!(
        correlation_id = %correlation_id,
        delay = %delay,
        upstream = %upstream.url,
        "request received"
    );

    let body = upstream::call(
        &state.http_client,
        &state.loaded.upstream_url,
        upstream.timeout(),
        delay,
        correlation_id,
    )
    .await?;
    let mut text = String::with_capacity(GREETING.len() + body.len());
    text.push_str(GREETING);
    text.push_str(&String::from_utf8_lossy(&body));
    Ok(text)
}

fn with_correlation_id(mut response: Response, correlation_id: &str) -> Response {
    if let Ok(value) = correlation_id.parse() {
        response.headers_mut().insert(CORRELATION_ID, value);
    }
    response
}
