//! HTTP status client and controller against a live mock backend

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use kinetic_core::readiness::{
    HttpTranscodeStatusClient, ReadinessCheckError, ReadinessController, ReadinessState,
    TranscodeStatus, TranscodeStatusClient,
};
use kinetic_core::{ApiEndpoints, KineticConfig, MediaReference};
use kinetic_sim::{AssetProfile, SimulatedTranscodeBackend};

async fn spawn_backend(backend: Arc<SimulatedTranscodeBackend>) -> SocketAddr {
    let (addr, _) = kinetic_sim::server::spawn(backend, "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    addr
}

async fn spawn_router(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr) -> KineticConfig {
    KineticConfig::for_testing()
        .with_base_url(&format!("http://{addr}"))
        .unwrap()
}

fn controller_for(config: &KineticConfig) -> ReadinessController {
    let client: Arc<dyn TranscodeStatusClient> =
        Arc::new(HttpTranscodeStatusClient::new(&config.api));
    ReadinessController::new(
        client,
        ApiEndpoints::new(&config.api.base_url),
        config.readiness.clone(),
    )
}

#[tokio::test]
async fn test_http_client_reads_status_from_backend() {
    let backend = Arc::new(SimulatedTranscodeBackend::new());
    backend.register_transcode("exercises/squat.mkv", 1);
    let addr = spawn_backend(backend).await;
    let client = HttpTranscodeStatusClient::new(&config_for(addr).api);

    assert_eq!(
        client.check_status("exercises/squat.mkv").await.unwrap(),
        TranscodeStatus::pending(false)
    );
    assert_eq!(
        client.check_status("exercises/squat.mkv").await.unwrap(),
        TranscodeStatus::cached()
    );
    assert_eq!(
        client.check_status("other.mp4").await.unwrap(),
        TranscodeStatus::default()
    );
}

#[tokio::test]
async fn test_asset_path_with_spaces_survives_encoding() {
    let backend = Arc::new(SimulatedTranscodeBackend::new());
    let addr = spawn_backend(backend.clone()).await;
    let client = HttpTranscodeStatusClient::new(&config_for(addr).api);

    client.check_status("leg day/bulgarian split squat.mp4").await.unwrap();
    let job = backend.job("leg day/bulgarian split squat.mp4").unwrap();
    assert_eq!(job.status_checks, 1);
}

#[tokio::test]
async fn test_controller_reaches_ready_over_http() {
    let backend = Arc::new(SimulatedTranscodeBackend::new());
    backend.register_transcode("exercises/squat.mkv", 2);
    let addr = spawn_backend(backend.clone()).await;
    let mut controller = controller_for(&config_for(addr));

    let target = controller
        .set_reference(Some(&MediaReference::from_path("exercises/squat.mkv")))
        .unwrap();
    assert_eq!(
        target.stream_url,
        format!("http://{addr}/api/videos/stream/exercises/squat.mkv")
    );

    let status = controller.wait_until_settled().await;
    assert_eq!(status.state, ReadinessState::Ready);
    assert_eq!(status.attempts, 2);
    assert!(controller.playback_allowed());

    let stream = reqwest::get(&target.stream_url).await.unwrap();
    assert!(stream.status().is_success());
}

#[tokio::test]
async fn test_server_error_falls_back_to_direct_play() {
    let backend = Arc::new(SimulatedTranscodeBackend::new());
    backend.register("42", AssetProfile::Failing { status: 500 });
    let addr = spawn_backend(backend.clone()).await;
    let mut controller = controller_for(&config_for(addr));

    let target = controller.set_reference(Some(&MediaReference::from_id("42")));
    let status = controller.wait_until_settled().await;

    assert_eq!(status.state, ReadinessState::Unknown);
    assert_eq!(status.message, None);
    assert!(status.check_failed);
    assert_eq!(
        target.map(|t| t.stream_url),
        Some(format!("http://{addr}/api/videos/stream/42"))
    );
    assert!(controller.playback_allowed());
    assert_eq!(backend.job("42").unwrap().status_checks, 1);
}

#[tokio::test]
async fn test_timeout_after_exact_poll_budget() {
    let backend = Arc::new(SimulatedTranscodeBackend::new());
    backend.register_transcode("huge.mkv", 1_000);
    let addr = spawn_backend(backend.clone()).await;
    let config = config_for(addr);
    let mut controller = controller_for(&config);

    controller.set_reference(Some(&MediaReference::from_path("huge.mkv")));
    let status = controller.wait_until_settled().await;

    assert_eq!(status.state, ReadinessState::Error);
    assert!(status.message.unwrap().contains("timed out"));
    let checks = backend.job("huge.mkv").unwrap().status_checks;
    assert_eq!(checks, config.readiness.max_poll_attempts + 1);
    assert!(!controller.playback_allowed());
}

#[tokio::test]
async fn test_malformed_and_partial_bodies() {
    let router = Router::new()
        .route(
            "/api/videos/transcode-status/garbage.mp4",
            get(|| async { "<html>not json</html>" }),
        )
        .route(
            "/api/videos/transcode-status/partial.mp4",
            get(|| async { axum::Json(serde_json::json!({ "needs_transcoding": true })) }),
        );
    let addr = spawn_router(router).await;
    let client = HttpTranscodeStatusClient::new(&config_for(addr).api);

    assert!(matches!(
        client.check_status("garbage.mp4").await,
        Err(ReadinessCheckError::MalformedResponse { .. })
    ));
    assert_eq!(
        client.check_status("partial.mp4").await.unwrap(),
        TranscodeStatus::pending(false)
    );
    assert_eq!(
        client.check_status("missing.mp4").await,
        Err(ReadinessCheckError::UnexpectedStatus { status: 404 })
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = config_for(addr);
    let client = HttpTranscodeStatusClient::new(&config.api);

    assert!(matches!(
        client.check_status("a.mp4").await,
        Err(ReadinessCheckError::Network { .. })
    ));

    let mut controller = controller_for(&config);
    controller.set_reference(Some(&MediaReference::from_path("a.mp4")));
    let status = controller.wait_until_settled().await;
    assert_eq!(status.state, ReadinessState::Unknown);
    assert!(status.check_failed);
}
