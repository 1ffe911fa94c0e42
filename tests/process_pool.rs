//! Process-pool tests against the real binary.
#![cfg(unix)]

use std::process::Stdio;
use std::time::{Duration, Instant};

use slowrelay::health::HealthResponse;
use slowrelay::slow_api;

async fn start_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, slow_api::build_router()).await.unwrap();
    });
    format!("http://{addr}/")
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_healthy(base: &str) -> HealthResponse {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        if let Ok(resp) = reqwest::get(format!("{base}/health")).await {
            if resp.status().is_success() {
                return resp.json().await.unwrap();
            }
        }
        assert!(Instant::now() < deadline, "pool never became healthy");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_forwards_and_stops_on_sigterm() {
    let upstream = start_upstream().await;
    let port = free_port();

    let mut supervisor = tokio::process::Command::new(env!("CARGO_BIN_EXE_slowrelay"))
        .args(["run", "--host", "127.0.0.1", "--json"])
        .args(["--port", &port.to_string()])
        .args(["--upstream", &upstream])
        .args(["--strategy", "process-pool", "--processes", "2", "--threads", "2"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let base = format!("http://127.0.0.1:{port}");
    let health = wait_healthy(&base).await;
    assert_eq!(health.strategy, "process-pool (2 processes x 2 threads)");
    assert_eq!(health.config.source, "supervisor");
    assert_ne!(Some(health.pid), supervisor.id());

    // 2 processes x 2 threads: four half-second requests overlap.
    let client = reqwest::Client::new();
    let start = Instant::now();
    let mut requests = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let request = client.get(format!("{base}/?delay=0.5")).send();
        requests.spawn(async move {
            let resp = request.await.unwrap();
            assert_eq!(resp.status(), 200);
            resp.text().await.unwrap()
        });
    }
    while let Some(body) = requests.join_next().await {
        assert_eq!(body.unwrap(), "Hi there! slow api response");
    }
    assert!(start.elapsed() < Duration::from_millis(1500));

    let pid = supervisor.id().unwrap().to_string();
    let killed = std::process::Command::new("kill")
        .args(["-TERM", &pid])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = tokio::time::timeout(Duration::from_secs(15), supervisor.wait())
        .await
        .expect("supervisor did not stop")
        .unwrap();
    assert!(status.success());
    assert!(reqwest::get(format!("{base}/health")).await.is_err());
}
