//! End-to-end forwarding tests: relay in front of an in-process upstream.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::io::AsyncWriteExt;

use slowrelay::config::model::{ServerConfig, Strategy};
use slowrelay::config::LoadedConfig;
use slowrelay::harness::{self, Harness};
use slowrelay::health::HealthResponse;
use slowrelay::server::{self, Stats};
use slowrelay::slow_api;

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn start_upstream() -> String {
    format!("http://{}/", serve(slow_api::build_router()).await)
}

/// An address nothing listens on.
fn closed_port() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

/// The in-process harnesses; every forwarding property must hold under each.
const STRATEGIES: [Strategy; 3] = [
    Strategy::SingleThreaded,
    Strategy::ThreadPool { threads: 4 },
    Strategy::Cooperative,
];

/// Requests a strategy can have in progress at once, capped at `wanted`.
fn capacity(strategy: &Strategy, wanted: usize) -> usize {
    match strategy {
        Strategy::SingleThreaded => 1,
        Strategy::ThreadPool { threads } | Strategy::ProcessPool { threads, .. } => {
            (*threads).min(wanted)
        }
        Strategy::Cooperative => wanted,
    }
}

fn start_relay(upstream: &str, timeout_ms: u64) -> (Harness, Arc<Stats>) {
    start_relay_with(Strategy::Cooperative, upstream, timeout_ms)
}

fn start_relay_with(
    strategy: Strategy,
    upstream: &str,
    timeout_ms: u64,
) -> (Harness, Arc<Stats>) {
    let mut config = ServerConfig::with_upstream(upstream);
    config.listen = "127.0.0.1:0".into();
    config.strategy = strategy;
    config.upstream.timeout = timeout_ms;
    let loaded = Arc::new(LoadedConfig::new(config, "test").unwrap());

    let listener = server::bind_listener(loaded.config.listen_addr().unwrap(), 128, false).unwrap();
    let stats = Arc::new(Stats::new());
    let make_router = server::router_factory(Arc::clone(&loaded), Arc::clone(&stats));
    let harness = harness::start(
        &loaded.config.strategy,
        &loaded.config.limits,
        listener,
        make_router,
    )
    .unwrap();
    (harness, stats)
}

#[tokio::test(flavor = "multi_thread")]
async fn relays_upstream_body_with_greeting() {
    let upstream = start_upstream().await;
    let (relay, _stats) = start_relay(&upstream, 30_000);

    let url = format!("http://{}/?delay=0.3", relay.local_addr());
    let start = Instant::now();
    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hi there! slow api response");
    assert!(start.elapsed() >= Duration::from_millis(300));

    relay.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_delay_defaults_to_one_second() {
    let upstream = start_upstream().await;
    let (relay, _stats) = start_relay(&upstream, 30_000);

    let start = Instant::now();
    let resp = reqwest::get(format!("http://{}/", relay.local_addr()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(start.elapsed() >= Duration::from_secs(1));

    relay.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_delay_is_forwarded() {
    let upstream = start_upstream().await;
    let (relay, _stats) = start_relay(&upstream, 30_000);

    let resp = reqwest::get(format!("http://{}/?delay=0", relay.local_addr()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hi there! slow api response");

    relay.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn non_numeric_delay_is_rejected_without_calling_upstream() {
    let (relay, stats) = start_relay(&closed_port(), 30_000);

    for bad in ["abc", "-1", "NaN", "inf"] {
        let resp = reqwest::get(format!("http://{}/?delay={bad}", relay.local_addr()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "delay={bad}");
    }
    assert_eq!(stats.failed.load(Ordering::Relaxed), 4);

    relay.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_upstream_is_bad_gateway() {
    let (relay, _stats) = start_relay(&closed_port(), 30_000);

    let resp = reqwest::get(format!("http://{}/?delay=0", relay.local_addr()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(resp.text().await.unwrap().contains("upstream unavailable"));

    relay.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_upstream_times_out_under_every_strategy() {
    let upstream = start_upstream().await;

    for strategy in STRATEGIES {
        let (relay, stats) = start_relay_with(strategy.clone(), &upstream, 200);

        let start = Instant::now();
        let resp = reqwest::get(format!("http://{}/?delay=5", relay.local_addr()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT, "{strategy:?}");
        assert!(start.elapsed() < Duration::from_secs(4), "{strategy:?}");
        assert_eq!(
            resp.text().await.unwrap(),
            "upstream did not respond within 200ms\n"
        );
        assert_eq!(stats.in_flight.load(Ordering::Relaxed), 0, "{strategy:?}");

        relay.shutdown().await.unwrap();
    }
}

/// Answers 503 for `delay=13`, otherwise sleeps and answers `ok`.
fn flaky_upstream() -> Router {
    Router::new().route(
        "/",
        get(|RawQuery(query): RawQuery| async move {
            if query.as_deref() == Some("delay=13") {
                return (StatusCode::SERVICE_UNAVAILABLE, "overloaded");
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
            (StatusCode::OK, "ok")
        }),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_request_does_not_disturb_concurrent_one() {
    let upstream = format!("http://{}/", serve(flaky_upstream()).await);
    let refused = closed_port();

    for strategy in STRATEGIES {
        let (relay, stats) = start_relay_with(strategy.clone(), &upstream, 30_000);
        let (broken, _) = start_relay_with(strategy.clone(), &refused, 30_000);
        let base = format!("http://{}", relay.local_addr());

        let client = reqwest::Client::new();
        let good = client.get(format!("{base}/?delay=1")).send();
        let bad = client.get(format!("{base}/?delay=13")).send();
        let unreachable = client
            .get(format!("http://{}/?delay=0", broken.local_addr()))
            .send();
        let (good, bad, unreachable) = tokio::join!(good, bad, unreachable);

        let bad = bad.unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_GATEWAY, "{strategy:?}");
        assert!(bad.text().await.unwrap().contains("503"));
        assert_eq!(unreachable.unwrap().status(), StatusCode::BAD_GATEWAY);

        let good = good.unwrap();
        assert_eq!(good.status(), 200, "{strategy:?}");
        assert_eq!(good.text().await.unwrap(), "Hi there! ok");

        assert_eq!(stats.forwarded.load(Ordering::Relaxed), 1, "{strategy:?}");
        assert_eq!(stats.failed.load(Ordering::Relaxed), 1, "{strategy:?}");

        drop(client);
        relay.shutdown().await.unwrap();
        broken.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn correlation_id_is_echoed() {
    let upstream = start_upstream().await;
    let (relay, _stats) = start_relay(&upstream, 30_000);

    let resp = reqwest::Client::new()
        .get(format!("http://{}/?delay=0", relay.local_addr()))
        .header("x-correlation-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-correlation-id"], "req-42");

    let resp = reqwest::get(format!("http://{}/?delay=0", relay.local_addr()))
        .await
        .unwrap();
    assert!(resp.headers().contains_key("x-correlation-id"));

    relay.shutdown().await.unwrap();
}

async fn assert_disconnects_release(strategy: Strategy, upstream: &str) {
    let (relay, stats) = start_relay_with(strategy.clone(), upstream, 30_000);
    let addr = relay.local_addr();
    let clients = capacity(&strategy, 20);

    let mut streams = Vec::new();
    for _ in 0..clients {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /?delay=20 HTTP/1.1\r\nHost: relay\r\n\r\n")
            .await
            .unwrap();
        streams.push(stream);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while stats.in_flight.load(Ordering::Relaxed) < clients as u64
        && Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        stats.in_flight.load(Ordering::Relaxed),
        clients as u64,
        "{strategy:?}"
    );

    drop(streams);

    let deadline = Instant::now() + Duration::from_secs(5);
    while stats.in_flight.load(Ordering::Relaxed) > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stats.in_flight.load(Ordering::Relaxed), 0, "{strategy:?}");

    // The relay keeps serving after the abandoned requests.
    let resp = reqwest::get(format!("http://{addr}/?delay=0")).await.unwrap();
    assert_eq!(resp.status(), 200, "{strategy:?}");

    relay.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnected_clients_release_their_requests() {
    let upstream = start_upstream().await;
    for strategy in STRATEGIES {
        assert_disconnects_release(strategy, &upstream).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_request_counts() {
    let upstream = start_upstream().await;
    let (relay, _stats) = start_relay(&upstream, 30_000);
    let base = format!("http://{}", relay.local_addr());

    reqwest::get(format!("{base}/?delay=0")).await.unwrap();
    reqwest::get(format!("{base}/?delay=soon")).await.unwrap();

    let health: HealthResponse = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.stats.requests_forwarded, 1);
    assert_eq!(health.stats.requests_failed, 1);
    assert_eq!(health.stats.requests_in_flight, 0);
    assert_eq!(health.config.upstream, upstream);

    relay.shutdown().await.unwrap();
}
