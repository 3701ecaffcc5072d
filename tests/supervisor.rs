//! Supervisor wiring with real listeners on fixed loopback ports.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;

use service_runtime::config::{AdminConfig, PublicGrpcConfig, PublicRestConfig, ServiceConfig};
use service_runtime::lifecycle::supervisor::{
    ADMIN_SERVER_NAME, PUBLIC_GRPC_SERVER_NAME, PUBLIC_REST_SERVER_NAME,
};
use service_runtime::lifecycle::CompositeState;
use service_runtime::{ManagedServer, ServerError, Supervisor};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

mod common;

use common::{wait_for_http, MockServer, OnStart};

fn config(admin: Option<u16>, rest: Option<u16>, grpc: Option<u16>) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.name = "orders".to_string();
    config.admin = admin.map(|port| AdminConfig {
        bind_address: format!("127.0.0.1:{}", port),
        api_key: Some("admin-key".to_string()),
    });
    config.public_rest = rest.map(|port| PublicRestConfig {
        bind_address: format!("127.0.0.1:{}", port),
        context_timeout_secs: 2,
    });
    config.public_grpc = grpc.map(|port| PublicGrpcConfig {
        bind_address: format!("127.0.0.1:{}", port),
    });
    config
}

fn ping_routes() -> Router {
    Router::new().route("/ping", get(|| async { "pong" }))
}

#[tokio::test]
async fn no_public_listener_is_fatal_before_anything_starts() {
    let worker = MockServer::blocking("worker").into_arc();
    let supervisor = Arc::new(
        Supervisor::builder(config(Some(28201), None, None))
            .server(worker.clone())
            .build()
            .unwrap(),
    );

    let runner = Arc::clone(&supervisor);
    let err = tokio::spawn(async move { runner.start().await })
        .await
        .unwrap_err();
    assert!(err.is_panic());

    let payload = err.into_panic();
    let message = payload.downcast_ref::<String>().expect("string panic payload");
    assert!(message.contains("cannot both be disabled"));
    assert_eq!(worker.starts(), 0);

    // Nothing was bound.
    assert!(tokio::net::TcpListener::bind("127.0.0.1:28201").await.is_ok());
}

#[tokio::test]
async fn stop_before_start_is_a_no_op() {
    let worker = MockServer::blocking("worker").into_arc();
    let supervisor = Supervisor::builder(config(None, Some(28211), None))
        .public_routes(ping_routes())
        .server(worker.clone())
        .build()
        .unwrap();

    supervisor.stop().await.unwrap();
    supervisor.graceful_stop().await.unwrap();

    assert!(supervisor.start().await.is_ok());
    assert_eq!(worker.starts(), 0);
    assert_eq!(worker.stops(), 0);
    assert!(supervisor.composite_state().await.is_none());
}

#[tokio::test]
async fn public_rest_section_without_routes_still_serves() {
    let supervisor = Arc::new(Supervisor::builder(config(None, Some(28261), None)).build().unwrap());

    let runner = Arc::clone(&supervisor);
    let serving = tokio::spawn(async move { runner.start().await });

    let mut answered = None;
    for _ in 0..100 {
        if let Ok(response) = reqwest::get("http://127.0.0.1:28261/anything").await {
            answered = Some(response);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let response = answered.expect("public REST listener never answered");
    assert_eq!(response.status(), 404);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(supervisor.server_names().await, vec![PUBLIC_REST_SERVER_NAME]);

    supervisor.stop().await.unwrap();
    assert!(serving.await.unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_racing_start_leaves_nothing_running() {
    for (round, port) in (28271u16..28276).enumerate() {
        let worker = MockServer::blocking("worker").into_arc();
        let supervisor = Arc::new(
            Supervisor::builder(config(None, Some(port), None))
                .public_routes(ping_routes())
                .server(worker.clone())
                .build()
                .unwrap(),
        );

        let runner = Arc::clone(&supervisor);
        let serving = tokio::spawn(async move { runner.start().await });
        for _ in 0..round {
            tokio::task::yield_now().await;
        }
        supervisor.stop().await.unwrap();

        let started = tokio::time::timeout(Duration::from_secs(5), serving)
            .await
            .expect("start kept running after a concurrent stop")
            .unwrap();
        assert!(started.is_ok());

        // Whichever side won, every sub-server that started has returned.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(worker.starts(), worker.finished());
        assert!(matches!(
            supervisor.composite_state().await,
            None | Some(CompositeState::Stopped)
        ));
    }
}

#[tokio::test]
async fn serves_every_listener_and_drains_on_graceful_stop() {
    let worker = MockServer::blocking("indexer").into_arc();
    let supervisor = Arc::new(
        Supervisor::builder(config(Some(28221), Some(28222), Some(28223)))
            .public_routes(ping_routes())
            .admin_routes(Router::new().route("/admin/flush", get(|| async { "flushed" })))
            .server(worker.clone())
            .build()
            .unwrap(),
    );

    let runner = Arc::clone(&supervisor);
    let serving = tokio::spawn(async move { runner.start().await });

    let ping = wait_for_http("http://127.0.0.1:28222/ping").await;
    assert!(ping.headers().contains_key("x-request-id"));
    assert_eq!(ping.text().await.unwrap(), "pong");

    assert_eq!(
        supervisor.server_names().await,
        vec![ADMIN_SERVER_NAME, PUBLIC_REST_SERVER_NAME, PUBLIC_GRPC_SERVER_NAME, "indexer"]
    );

    // Health is ready once wired; probes are unguarded, admin routes are not.
    let ready = wait_for_http("http://127.0.0.1:28221/health/ready").await;
    assert_eq!(ready.status(), 200);

    let client = reqwest::Client::new();
    let denied = client
        .get("http://127.0.0.1:28221/admin/status")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 401);

    let status: serde_json::Value = client
        .get("http://127.0.0.1:28221/admin/status")
        .bearer_auth("admin-key")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["service"], "orders");
    assert_eq!(status["ready"], true);

    // gRPC health reports the whole server as serving.
    let mut grpc = HealthClient::new(tonic::transport::Channel::from_shared("http://127.0.0.1:28223").unwrap().connect().await.unwrap());
    let check = grpc
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(check.status, ServingStatus::Serving as i32);

    drop(client);
    drop(grpc);

    let health = supervisor.health().await.expect("health enabled");
    tokio::time::timeout(Duration::from_secs(5), supervisor.graceful_stop())
        .await
        .expect("graceful stop hung")
        .unwrap();

    assert!(!health.is_ready());
    assert_eq!(worker.graceful_stops(), 1);
    assert_eq!(worker.stops(), 0);
    assert_eq!(supervisor.composite_state().await, Some(CompositeState::Stopped));
    assert!(serving.await.unwrap().is_ok());

    // Sockets are released.
    assert!(reqwest::get("http://127.0.0.1:28222/ping").await.is_err());
}

#[tokio::test]
async fn listener_failure_ends_start() {
    let squatter = tokio::net::TcpListener::bind("127.0.0.1:28232").await.unwrap();
    let worker = MockServer::blocking("worker").into_arc();
    let supervisor = Supervisor::builder(config(None, Some(28232), None))
        .public_routes(ping_routes())
        .server(worker.clone())
        .build()
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), supervisor.start())
        .await
        .expect("start did not return after bind failure")
        .unwrap_err();
    match &err {
        ServerError::SubServer { index, name, source, .. } => {
            assert_eq!(*index, 1);
            assert_eq!(name, PUBLIC_REST_SERVER_NAME);
            assert!(matches!(**source, ServerError::Bind { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The worker is still running until the caller stops everything.
    assert_eq!(worker.finished(), 0);
    supervisor.stop().await.unwrap();
    assert_eq!(worker.stops(), 1);
    drop(squatter);
}

#[tokio::test]
async fn worker_exit_ends_start() {
    let worker = MockServer::new("batch", OnStart::Succeed(Duration::from_millis(100))).into_arc();
    let supervisor = Supervisor::builder(config(None, Some(28241), None))
        .public_routes(ping_routes())
        .server(worker.clone())
        .build()
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), supervisor.start())
        .await
        .expect("start ignored the worker exit");
    assert!(result.is_ok());
    assert_eq!(worker.finished(), 1);

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.composite_state().await, Some(CompositeState::Stopped));
}

#[tokio::test]
async fn second_start_is_rejected() {
    let supervisor = Arc::new(
        Supervisor::builder(config(None, Some(28251), None))
            .public_routes(ping_routes())
            .build()
            .unwrap(),
    );

    let runner = Arc::clone(&supervisor);
    let serving = tokio::spawn(async move { runner.start().await });
    wait_for_http("http://127.0.0.1:28251/ping").await;

    assert!(matches!(
        supervisor.start().await,
        Err(ServerError::AlreadyStarted { .. })
    ));

    supervisor.stop().await.unwrap();
    assert!(serving.await.unwrap().is_ok());
    assert_eq!(supervisor.name(), "orders");
}
