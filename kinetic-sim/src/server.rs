//! HTTP surface of the simulated backend
//!
//! Serves the same paths as the real backend so a client can be pointed at
//! it with nothing but a base URL change.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::backend::{SimulatedTranscodeBackend, StreamAvailability, TranscodeJob};

/// Placeholder media returned for streamable assets.
const PLACEHOLDER_MEDIA: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";

/// Seconds a client should wait before retrying a stream that is transcoding.
const RETRY_AFTER_SECS: &str = "2";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind mock backend to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Mock backend stopped: {0}")]
    Serve(#[source] std::io::Error),
}

/// Builds the router for `backend`.
pub fn router(backend: Arc<SimulatedTranscodeBackend>) -> Router {
    Router::new()
        .route("/api/videos/transcode-status/{*asset}", get(transcode_status))
        .route("/api/videos/stream/{*asset}", get(stream))
        .route("/api/videos/transcode-jobs", get(transcode_jobs))
        .layer(CorsLayer::permissive())
        .with_state(backend)
}

/// Serves `backend` on `addr` until the process exits.
///
/// # Errors
/// - `ServerError::Bind` - Address unavailable
/// - `ServerError::Serve` - Listener failed while serving
pub async fn serve(
    backend: Arc<SimulatedTranscodeBackend>,
    addr: SocketAddr,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local = listener.local_addr().unwrap_or(addr);
    info!("Mock backend listening on http://{local}");

    axum::serve(listener, router(backend))
        .await
        .map_err(ServerError::Serve)
}

/// Binds `addr` and serves in the background.
///
/// Returns the bound address, useful with port 0.
///
/// # Errors
/// - `ServerError::Bind` - Address unavailable
pub async fn spawn(
    backend: Arc<SimulatedTranscodeBackend>,
    addr: SocketAddr,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(backend)).await {
            warn!("Mock backend on {local} stopped: {e}");
        }
    });

    debug!("Mock backend spawned on http://{local}");
    Ok((local, handle))
}

async fn transcode_status(
    State(backend): State<Arc<SimulatedTranscodeBackend>>,
    Path(asset): Path<String>,
) -> Response {
    match backend.observe_status(&asset) {
        Ok(status) => {
            debug!("Transcode status for {asset}: {status:?}");
            Json(status).into_response()
        }
        Err(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": "transcode status unavailable" }))).into_response()
        }
    }
}

async fn stream(
    State(backend): State<Arc<SimulatedTranscodeBackend>>,
    Path(asset): Path<String>,
) -> Response {
    match backend.open_stream(&asset) {
        StreamAvailability::Available => (
            [(header::CONTENT_TYPE, "video/mp4")],
            PLACEHOLDER_MEDIA,
        )
            .into_response(),
        StreamAvailability::Transcoding => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
            Json(json!({ "error": "transcoding in progress", "asset": asset })),
        )
            .into_response(),
        StreamAvailability::Failed { status } => {
            StatusCode::from_u16(status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
    }
}

async fn transcode_jobs(
    State(backend): State<Arc<SimulatedTranscodeBackend>>,
) -> Json<Vec<TranscodeJob>> {
    Json(backend.jobs())
}
