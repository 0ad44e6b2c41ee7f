//! Per-mount playback session state

use serde::Serialize;

/// Transient playback state for one mounted player.
///
/// Discarded whenever the element unmounts or the media reference changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSession {
    pub playing: bool,
    /// Seconds from the start of the media
    pub current_time: f64,
    /// Seconds; 0 until metadata has loaded
    pub duration: f64,
    /// In `[0, 1]`
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub fullscreen: bool,
    /// Source is loading and not yet playable
    pub loading: bool,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            fullscreen: false,
            loading: false,
        }
    }
}

impl PlaybackSession {
    /// Check if a usable duration is known.
    pub fn duration_known(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }

    /// Playback position as a fraction of the duration, 0 when unknown.
    pub fn progress(&self) -> f64 {
        if self.duration_known() {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Seconds left, if the duration is known.
    pub fn remaining(&self) -> Option<f64> {
        self.duration_known()
            .then(|| (self.duration - self.current_time).max(0.0))
    }
}
