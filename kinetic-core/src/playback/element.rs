//! Native media element abstraction

use tokio::sync::mpsc;

use super::error::PlaybackError;

/// Native events a media element reports.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Element started loading a source
    LoadStart,
    /// Metadata parsed; duration in seconds, possibly NaN or infinite for live streams
    LoadedMetadata { duration: f64 },
    /// Enough data buffered to start playing
    CanPlay,
    /// Playback position moved
    TimeUpdate { current_time: f64 },
    Playing,
    Pause,
    /// Reached the end of the media
    Ended,
    /// Load or decode failure
    Error {
        code: MediaErrorCode,
        message: String,
    },
}

/// Failure classes a media element reports, mirroring the HTML media error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    /// Fetching was aborted on request
    Aborted,
    /// Network failure while fetching
    Network,
    /// Data could not be decoded
    Decode,
    /// Source format or URL cannot be played at all
    SourceNotSupported,
}

impl std::fmt::Display for MediaErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaErrorCode::Aborted => "aborted",
            MediaErrorCode::Network => "network",
            MediaErrorCode::Decode => "decode",
            MediaErrorCode::SourceNotSupported => "source not supported",
        };
        f.write_str(name)
    }
}

/// Channel end a media element forwards its events into.
pub type MediaEventSink = mpsc::UnboundedSender<MediaEvent>;

/// A native media element the transport drives.
///
/// Implementations wrap whatever actually renders video (a browser element
/// behind bindings, a desktop player, a test double). Calls are
/// fire-and-forget except where the element can refuse synchronously.
pub trait MediaElement: Send {
    /// Replaces the source and starts loading it.
    fn load(&mut self, src: &str);

    /// # Errors
    /// - `PlaybackError::PlayRejected` - Element refused to start playback
    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn set_current_time(&mut self, seconds: f64);

    /// Volume in `[0, 1]`.
    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    fn set_playback_rate(&mut self, rate: f64);

    /// # Errors
    /// - `PlaybackError::FullscreenUnavailable` - Fullscreen request was denied
    fn request_fullscreen(&mut self) -> Result<(), PlaybackError>;

    /// # Errors
    /// - `PlaybackError::FullscreenUnavailable` - Element could not leave fullscreen
    fn exit_fullscreen(&mut self) -> Result<(), PlaybackError>;

    /// Starts forwarding native events into `sink`, replacing any previous listener.
    fn attach_listener(&mut self, sink: MediaEventSink);

    /// Stops forwarding events.
    fn detach_listener(&mut self);
}
