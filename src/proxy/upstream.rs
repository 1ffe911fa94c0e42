//! The single outbound call made for every inbound request.
//!
//! [`call`] builds `GET <upstream>?delay=<n>`, sends it through the
//! worker's pooled hyper client and collects the body, all under one
//! deadline. Dropping the returned future (the caller went away) drops the
//! in-progress hyper request with it.

use std::time::{Duration, Instant};

use axum::http::Method;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};

use url::Url;

use super::delay::Delay;
use crate::error::ForwardError;
use crate::server::HttpClient;

/// Append `delay` to the upstream base URL.
#[must_use]
pub fn outbound_url(base: &Url, delay: Delay) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("delay", &delay.to_string());
    url
}

/// Issue the outbound request and return the upstream body on a 2xx answer.
pub async fn call(
    client: &HttpClient,
    base: &Url,
    timeout: Duration,
    delay: Delay,
    correlation_id: &str,
) -> Result<Bytes, ForwardError> {
    let url = outbound_url(base, delay);

    let request = hyper::Request::builder()
        .method(Method::GET)
        .uri(url.as_str())
        .header(super::CORRELATION_ID, correlation_id)
        .body(Full::new(Bytes::new()))
        .map_err(|e| ForwardError::InternalFault(format!("failed to build upstream request: {e}")))?;

    let start = Instant::now();
    let exchange = async {
        let response = client
            .request(request)
            .await
            .map_err(|e| ForwardError::UpstreamUnavailable {
                source: Box::new(e),
            })?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ForwardError::UpstreamUnavailable {
                source: Box::new(e),
            })?
            .to_bytes();
        Ok::<_, ForwardError>((status, body))
    };

    let (status, body) = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ForwardError::UpstreamTimeout { timeout })??;

    #[allow(clippy::cast_possible_truncation)]
    let latency_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        correlation_id = %correlation_id,
        upstream = %url,
        status = status.as_u16(),
        latency_ms,
        "upstream responded"
    );

    if !status.is_success() {
        return Err(ForwardError::UpstreamStatus { status });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn appends_delay_to_bare_host() {
        let url = outbound_url(&base("http://slow_api:8001"), Delay::default());
        assert_eq!(url.as_str(), "http://slow_api:8001/?delay=1");
    }

    #[test]
    fn keeps_base_path() {
        let delay = Delay::parse(Some("0.5")).unwrap();
        let url = outbound_url(&base("http://api.internal/slow/"), delay);
        assert_eq!(url.as_str(), "http://api.internal/slow/?delay=0.5");
    }

    #[test]
    fn base_url_is_left_untouched() {
        let base = base("http://slow_api:8001/");
        let _ = outbound_url(&base, Delay::default());
        let again = outbound_url(&base, Delay::parse(Some("2")).unwrap());
        assert_eq!(base.query(), None);
        assert_eq!(again.as_str(), "http://slow_api:8001/?delay=2");
    }
}
