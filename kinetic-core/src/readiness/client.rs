//! Transcode status client
//!
//! One request per call; retries and polling live in the controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::media::ApiEndpoints;

/// Body of `GET /api/videos/transcode-status/{asset}`.
///
/// Missing fields default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeStatus {
    #[serde(default)]
    pub needs_transcoding: bool,
    #[serde(default)]
    pub cache_exists: bool,
    #[serde(default)]
    pub transcoding_in_progress: bool,
}

impl TranscodeStatus {
    /// Transcoding required and no cached copy yet.
    pub fn pending(in_progress: bool) -> Self {
        Self {
            needs_transcoding: true,
            cache_exists: false,
            transcoding_in_progress: in_progress,
        }
    }

    /// Transcoding was required and the cached copy now exists.
    pub fn cached() -> Self {
        Self {
            needs_transcoding: true,
            cache_exists: true,
            transcoding_in_progress: false,
        }
    }

    /// Asset can be streamed now: either it never needed transcoding or the
    /// transcoded copy is cached.
    pub fn is_ready(&self) -> bool {
        !self.needs_transcoding || self.cache_exists
    }
}

/// Errors from a single status request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadinessCheckError {
    #[error("Status request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Status endpoint returned HTTP {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Malformed status response: {reason}")]
    MalformedResponse { reason: String },
}

/// Source of transcode status for media assets.
///
/// Implementations cover the real backend over HTTP, the offline simulated
/// backend, and scripted clients for tests.
#[async_trait]
pub trait TranscodeStatusClient: Send + Sync + std::fmt::Debug {
    /// Issues one status request for `asset`.
    ///
    /// # Errors
    /// - `ReadinessCheckError::Network` - Backend unreachable or request timed out
    /// - `ReadinessCheckError::UnexpectedStatus` - Non-2xx response
    /// - `ReadinessCheckError::MalformedResponse` - Body is not a status object
    async fn check_status(&self, asset: &str) -> Result<TranscodeStatus, ReadinessCheckError>;
}

/// Status client talking to the backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTranscodeStatusClient {
    client: reqwest::Client,
    endpoints: ApiEndpoints,
}

impl HttpTranscodeStatusClient {
    /// Creates a client using the API timeout and user agent settings.
    pub fn new(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {e}");
                reqwest::Client::default()
            });

        Self {
            client,
            endpoints: ApiEndpoints::new(&config.base_url),
        }
    }

    /// Endpoints this client resolves asset keys against.
    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }
}

#[async_trait]
impl TranscodeStatusClient for HttpTranscodeStatusClient {
    async fn check_status(&self, asset: &str) -> Result<TranscodeStatus, ReadinessCheckError> {
        let url = self.endpoints.transcode_status_url(asset);
        debug!("Requesting transcode status: {url}");

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| ReadinessCheckError::Network {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReadinessCheckError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ReadinessCheckError::Network {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        parse_status_body(&body)
    }
}

/// Parses a status response body.
///
/// # Errors
/// - `ReadinessCheckError::MalformedResponse` - Body is not a JSON object of the expected shape
pub fn parse_status_body(body: &[u8]) -> Result<TranscodeStatus, ReadinessCheckError> {
    serde_json::from_slice(body).map_err(|e| ReadinessCheckError::MalformedResponse {
        reason: e.to_string(),
    })
}
