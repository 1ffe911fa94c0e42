//! A deliberately slow upstream for exercising the relay.
//!
//! `GET /?delay=<n>` sleeps `n` seconds on a Tokio timer (never blocking
//! the executor) and answers `slow api response`. The delay follows the
//! same parsing rules as the relay.

use std::time::Instant;

use axum::extract::RawQuery;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::proxy::delay::Delay;

pub const RESPONSE_BODY: &str = "slow api response";

pub fn build_router() -> Router {
    Router::new()
        .route("/", get(slow_handler))
        .layer(TraceLayer::new_for_http())
}

pub async fn slow_handler(RawQuery(query): RawQuery) -> Response {
    let delay = match Delay::from_query(query.as_deref()) {
        Ok(delay) => delay,
        Err(e) => return e.into_response(),
    };

    let start = Instant::now();
    tokio::time::sleep(delay.as_duration()).await;
    #[allow(clippy::cast_possible_truncation)]
    let slept_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(delay = %delay, slept_ms, "slow response sent");

    RESPONSE_BODY.into_response()
}
