//! End-to-end routing through the inbound server.

use axum::body::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use fleet_balancer::config::FleetConfig;
use fleet_balancer::http::{HttpServer, X_INSTANCE_ID, X_REQUEST_ID};
use fleet_balancer::lifecycle::Shutdown;
use fleet_balancer::load_balancer::{FleetRegistry, LeastConnections, RoundRobin, SharedStrategy};
use fleet_balancer::routing::{HttpTransport, Router};

mod common;

struct Running {
    url: String,
    shutdown: Shutdown,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

async fn serve(registry: Arc<FleetRegistry>, strategy: Arc<SharedStrategy>) -> Running {
    let mut config = FleetConfig::default();
    config.timeouts.forward_secs = 2;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = Shutdown::new();
    let server = tokio::spawn(HttpServer::new(&config, registry, strategy).run(listener, shutdown.subscribe()));

    Running { url, shutdown, server }
}

fn round_robin() -> Arc<SharedStrategy> {
    Arc::new(SharedStrategy::new(Box::new(RoundRobin::new())))
}

#[tokio::test]
async fn test_round_robin_end_to_end() {
    let (registry, _launcher) = common::mock_fleet(47110, 2, 5);
    let running = serve(registry.clone(), round_robin()).await;
    let client = reqwest::Client::new();

    let mut served = Vec::new();
    for i in 0..4 {
        let res = client
            .post(format!("{}/work", running.url))
            .body(format!("payload-{}", i))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        assert!(res.headers().contains_key(X_REQUEST_ID));
        served.push(res.headers()[X_INSTANCE_ID].to_str().unwrap().to_string());
        assert_eq!(res.text().await.unwrap(), format!("payload-{}", i));
    }

    assert_eq!(
        served,
        vec!["127.0.0.1:47110", "127.0.0.1:47111", "127.0.0.1:47110", "127.0.0.1:47111"]
    );
    for instance in registry.all_instances() {
        assert_eq!(instance.request_count(), 2);
        assert_eq!(instance.active_connections(), 0);
    }

    running.shutdown.trigger();
    running.server.await.unwrap().unwrap();
    registry.shutdown();
}

#[tokio::test]
async fn test_unhealthy_instances_are_skipped() {
    let (registry, _launcher) = common::mock_fleet(47120, 2, 5);
    let running = serve(registry.clone(), round_robin()).await;
    let client = reqwest::Client::new();

    registry.update_health("127.0.0.1:47120", false, None, None);
    for _ in 0..3 {
        let res = client.post(&running.url).body("x").send().await.unwrap();
        assert_eq!(res.headers()[X_INSTANCE_ID], "127.0.0.1:47121");
    }

    registry.update_health("127.0.0.1:47121", false, None, None);
    let res = client.post(&running.url).body("x").send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "No healthy instance available");

    running.shutdown.trigger();
    running.server.await.unwrap().unwrap();
    registry.shutdown();
}

#[tokio::test]
async fn test_backend_failure_is_not_retried() {
    let (registry, launcher) = common::mock_fleet(47130, 2, 5);
    let running = serve(registry.clone(), round_robin()).await;
    let client = reqwest::Client::new();

    launcher.backend(47130).set_status(500);
    let res = client.post(&running.url).body("x").send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert!(!res.headers().contains_key(X_INSTANCE_ID));

    // The next request moves on to the other instance; nothing was retried in between.
    let res = client.post(&running.url).body("y").send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[X_INSTANCE_ID], "127.0.0.1:47131");
    assert_eq!(registry.find_by_id("127.0.0.1:47130").unwrap().request_count(), 1);

    running.shutdown.trigger();
    running.server.await.unwrap().unwrap();
    registry.shutdown();
}

#[tokio::test]
async fn test_concurrent_requests_release_connections() {
    let (registry, _launcher) = common::mock_fleet(47140, 3, 5);
    let strategy = Arc::new(SharedStrategy::new(Box::new(LeastConnections::new())));
    let running = serve(registry.clone(), strategy).await;
    let client = reqwest::Client::new();

    let requests: Vec<_> = (0..60)
        .map(|i| {
            let client = client.clone();
            let url = running.url.clone();
            tokio::spawn(async move {
                let res = client.post(url).body(format!("{}", i)).send().await.unwrap();
                assert_eq!(res.status(), 200);
                res.headers()[X_INSTANCE_ID].to_str().unwrap().to_string()
            })
        })
        .collect();

    let mut per_instance: HashMap<String, usize> = HashMap::new();
    for request in requests {
        *per_instance.entry(request.await.unwrap()).or_default() += 1;
    }

    assert_eq!(per_instance.values().sum::<usize>(), 60);
    let total: u64 = registry.all_instances().iter().map(|i| i.request_count()).sum();
    assert_eq!(total, 60);
    assert!(registry.all_instances().iter().all(|i| i.active_connections() == 0));

    running.shutdown.trigger();
    running.server.await.unwrap().unwrap();
    registry.shutdown();
}

#[tokio::test]
async fn test_scheme_relative_path_stays_on_selected_instance() {
    let (registry, _launcher) = common::mock_fleet(47150, 1, 1);

    // A listener outside the pool that records whether anything reached it.
    let reached = Arc::new(AtomicBool::new(false));
    let outsider = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let outsider_port = outsider.local_addr().unwrap().port();
    let flag = reached.clone();
    let app = axum::Router::new().fallback(move || {
        let flag = flag.clone();
        async move {
            flag.store(true, Ordering::SeqCst);
            "stolen"
        }
    });
    let outsider_server = tokio::spawn(async move {
        let _ = axum::serve(outsider, app).await;
    });

    let router = Router::new(
        registry.clone(),
        round_robin(),
        HttpTransport::new(Duration::from_secs(2), 1024 * 1024),
    );
    let path = format!("//127.0.0.1:{}/steal", outsider_port);
    let routed = router
        .handle_request(&path, Bytes::from_static(b"secret"))
        .await
        .unwrap();

    assert_eq!(routed.instance_id, "127.0.0.1:47150");
    assert_eq!(routed.payload, Bytes::from_static(b"secret"));
    assert!(!reached.load(Ordering::SeqCst));

    outsider_server.abort();
    registry.shutdown();
}
