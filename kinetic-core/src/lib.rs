//! Kinetic Core - Video readiness and playback transport
//!
//! This crate provides the client-side building blocks for playing exercise
//! videos served by the Kinetic backend: media reference resolution, the
//! on-demand transcoding readiness protocol, and a transport surface over a
//! native media element.

pub mod config;
pub mod media;
pub mod mode;
pub mod playback;
pub mod player;
pub mod readiness;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{ConfigError, KineticConfig};
pub use media::{ApiEndpoints, MediaReference, PlaybackTarget};
pub use mode::RuntimeMode;
pub use playback::{MediaElement, MediaEvent, PlaybackError, PlaybackSession, Transport};
pub use player::VideoPlayer;
pub use readiness::{
    HttpTranscodeStatusClient, ReadinessCheckError, ReadinessController, ReadinessState,
    ReadinessStatus, TranscodeStatus, TranscodeStatusClient,
};

/// Errors that can surface from any Kinetic subsystem.
///
/// Component-level failures (readiness checks, playback) are normally kept as
/// explicit state; this type exists for the edges where they are reported to
/// a caller such as the CLI.
#[derive(Debug, thiserror::Error)]
pub enum KineticError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Readiness check failed: {0}")]
    ReadinessCheck(#[from] ReadinessCheckError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Transcoding timed out: {message}")]
    TranscodingTimeout { message: String },

    #[error("Nothing to play: media reference is empty")]
    EmptyReference,
}

impl KineticError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            KineticError::Configuration(e) => format!("Configuration problem: {e}"),
            KineticError::ReadinessCheck(_) => {
                "Could not check whether the video is ready".to_string()
            }
            KineticError::Playback(e) if e.is_retryable() => {
                "The video could not be played. Try again.".to_string()
            }
            KineticError::Playback(_) => "This video cannot be played on this device".to_string(),
            KineticError::TranscodingTimeout { message } => message.clone(),
            KineticError::EmptyReference => "No video selected".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KineticError>;
