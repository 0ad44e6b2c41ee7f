//! Playback errors
//!
//! Kept apart from readiness errors: these mean the media pipeline could not
//! load or decode a URL that the backend considered ready.

use thiserror::Error;

use super::element::MediaErrorCode;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// `play()` was refused, e.g. by an autoplay policy
    #[error("Playback was rejected: {reason}")]
    PlayRejected { reason: String },

    /// The element reported a load or decode failure
    #[error("Media error ({code}): {message}")]
    Media {
        code: MediaErrorCode,
        message: String,
    },

    #[error("Fullscreen unavailable: {reason}")]
    FullscreenUnavailable { reason: String },
}

impl PlaybackError {
    /// Check if offering the user a retry makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlaybackError::PlayRejected { .. } => true, // user gesture may unlock it
            PlaybackError::Media { code, .. } => *code != MediaErrorCode::SourceNotSupported,
            PlaybackError::FullscreenUnavailable { .. } => false,
        }
    }
}
