//! Imperative controls and event normalization for a mounted media element

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::element::{MediaElement, MediaEvent};
use super::error::PlaybackError;
use super::session::PlaybackSession;

/// Notifications the transport emits to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportNotification {
    /// Playback position moved
    Progress { current_time: f64, duration: f64 },
    /// Media played to the end
    Completed,
    /// Media bound to an exercise played to the end
    ExerciseCompleted { exercise_id: String },
}

/// Controls for one media element and the session it plays.
///
/// Every control is a no-op while no element is mounted.
#[derive(Default)]
pub struct Transport {
    element: Option<Box<dyn MediaElement>>,
    events: Option<mpsc::UnboundedReceiver<MediaEvent>>,
    notifications: Option<mpsc::UnboundedSender<TransportNotification>>,
    session: PlaybackSession,
    source: Option<String>,
    playback_error: Option<PlaybackError>,
    exercise_id: Option<String>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("mounted", &self.element.is_some())
            .field("session", &self.session)
            .field("source", &self.source)
            .field("playback_error", &self.playback_error)
            .field("exercise_id", &self.exercise_id)
            .finish()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `element`, replacing and unmounting any previous one.
    pub fn mount(&mut self, element: Box<dyn MediaElement>) {
        self.unmount();
        self.element = Some(element);
        self.resubscribe();
        debug!("Media element mounted");
    }

    /// Installs a fresh event sink, dropping anything queued for the old source.
    fn resubscribe(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        let (sink, events) = mpsc::unbounded_channel();
        element.attach_listener(sink);
        self.events = Some(events);
    }

    /// Detaches the event listener, drops the element and discards the session.
    pub fn unmount(&mut self) {
        if let Some(mut element) = self.element.take() {
            element.detach_listener();
            debug!("Media element unmounted");
        }
        self.events = None;
        self.source = None;
        self.playback_error = None;
        self.session = PlaybackSession::default();
    }

    pub fn is_mounted(&self) -> bool {
        self.element.is_some()
    }

    /// Receiver for progress and completion notifications.
    ///
    /// Replaces any previously handed-out receiver.
    pub fn notifications(&mut self) -> mpsc::UnboundedReceiver<TransportNotification> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.notifications = Some(sender);
        receiver
    }

    /// Binds played media to an exercise so completion is reported for it.
    pub fn bind_exercise(&mut self, exercise_id: Option<String>) {
        self.exercise_id = exercise_id;
    }

    /// Loads `src` into the element and starts a fresh session.
    ///
    /// Volume, mute and rate carry over from the previous session.
    ///
    /// Events still queued for the previous source are discarded.
    pub fn load(&mut self, src: &str) {
        if self.element.is_none() {
            return;
        }

        let previous = std::mem::take(&mut self.session);
        self.session.volume = previous.volume;
        self.session.muted = previous.muted;
        self.session.playback_rate = previous.playback_rate;
        self.session.fullscreen = previous.fullscreen;
        self.session.loading = true;
        self.playback_error = None;
        self.source = Some(src.to_string());

        self.resubscribe();
        if let Some(element) = self.element.as_mut() {
            element.load(src);
        }
    }

    /// Clears the source and session without unmounting the element.
    pub fn unload(&mut self) {
        if let Some(element) = self.element.as_mut()
            && self.session.playing
        {
            element.pause();
        }
        let fullscreen = self.session.fullscreen;
        self.session = PlaybackSession {
            fullscreen,
            ..PlaybackSession::default()
        };
        self.source = None;
        self.playback_error = None;
        self.resubscribe();
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Last playback failure, if any.
    pub fn playback_error(&self) -> Option<&PlaybackError> {
        self.playback_error.as_ref()
    }

    /// Starts playback. Failures are recorded as the playback error.
    pub fn play(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if self.source.is_none() {
            debug!("Ignoring play() with no source loaded");
            return;
        }

        match element.play() {
            Ok(()) => {
                self.session.playing = true;
                self.playback_error = None;
            }
            Err(error) => {
                warn!("Playback failed to start: {error}");
                self.session.playing = false;
                self.playback_error = Some(error);
            }
        }
    }

    pub fn pause(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        element.pause();
        self.session.playing = false;
    }

    pub fn toggle_play(&mut self) {
        if self.session.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seeks to `fraction` of the duration.
    ///
    /// The fraction is clamped to `[0, 1]`; ignored while the duration is unknown.
    pub fn seek(&mut self, fraction: f64) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if !self.session.duration_known() || fraction.is_nan() {
            return;
        }

        let duration = self.session.duration;
        let time = (fraction.clamp(0.0, 1.0) * duration).clamp(0.0, duration);
        element.set_current_time(time);
        self.session.current_time = time;
    }

    /// Sets volume in `[0, 1]`; zero mutes, anything louder unmutes.
    pub fn set_volume(&mut self, volume: f64) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if volume.is_nan() {
            return;
        }

        let volume = volume.clamp(0.0, 1.0);
        let muted = volume == 0.0;
        element.set_volume(volume);
        element.set_muted(muted);
        self.session.volume = volume;
        self.session.muted = muted;
    }

    /// Flips mute. Unmuting at zero volume restores full volume.
    pub fn toggle_mute(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };

        let muted = !self.session.muted;
        if !muted && self.session.volume == 0.0 {
            element.set_volume(1.0);
            self.session.volume = 1.0;
        }
        element.set_muted(muted);
        self.session.muted = muted;
    }

    /// Sets the playback rate. Non-finite or non-positive rates are ignored.
    pub fn set_playback_rate(&mut self, rate: f64) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if !rate.is_finite() || rate <= 0.0 {
            return;
        }
        element.set_playback_rate(rate);
        self.session.playback_rate = rate;
    }

    pub fn toggle_fullscreen(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };

        let result = if self.session.fullscreen {
            element.exit_fullscreen()
        } else {
            element.request_fullscreen()
        };

        match result {
            Ok(()) => self.session.fullscreen = !self.session.fullscreen,
            Err(error) => warn!("Fullscreen toggle failed: {error}"),
        }
    }

    /// Seeks to the start and plays.
    pub fn restart(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        element.set_current_time(0.0);
        self.session.current_time = 0.0;
        self.play();
    }

    /// Check if `retry` would reload the source.
    pub fn can_retry(&self) -> bool {
        self.source.is_some()
            && self
                .playback_error
                .as_ref()
                .is_none_or(PlaybackError::is_retryable)
    }

    /// Reloads the current source and plays it, clearing the playback error.
    ///
    /// Returns false without touching the element when there is no source or
    /// the recorded error cannot be fixed by reloading.
    pub fn retry(&mut self) -> bool {
        if !self.can_retry() {
            debug!("Retry skipped: {:?}", self.playback_error);
            return false;
        }
        let Some(src) = self.source.clone() else {
            return false;
        };
        self.load(&src);
        self.play();
        true
    }

    /// Applies one native event to the session.
    ///
    /// Events arriving while no source is loaded are dropped.
    pub fn handle_event(&mut self, event: MediaEvent) {
        if self.element.is_none() || self.source.is_none() {
            return;
        }

        match event {
            MediaEvent::LoadStart => {
                self.session.loading = true;
            }
            MediaEvent::LoadedMetadata { duration } => {
                if duration.is_finite() && duration > 0.0 {
                    self.session.duration = duration;
                }
            }
            MediaEvent::CanPlay => {
                self.session.loading = false;
            }
            MediaEvent::TimeUpdate { current_time } => {
                self.session.current_time = current_time;
                self.notify(TransportNotification::Progress {
                    current_time,
                    duration: self.session.duration,
                });
            }
            MediaEvent::Playing => {
                self.session.playing = true;
                self.session.loading = false;
            }
            MediaEvent::Pause => {
                self.session.playing = false;
            }
            MediaEvent::Ended => {
                self.session.playing = false;
                self.notify(TransportNotification::Completed);
                if let Some(exercise_id) = self.exercise_id.clone() {
                    self.notify(TransportNotification::ExerciseCompleted { exercise_id });
                }
            }
            MediaEvent::Error { code, message } => {
                warn!("Media element error ({code}): {message}");
                self.session.playing = false;
                self.session.loading = false;
                self.playback_error = Some(PlaybackError::Media { code, message });
            }
        }
    }

    /// Applies every queued native event. Returns how many were handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self
            .events
            .as_mut()
            .and_then(|events| events.try_recv().ok())
        {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits for the next native event and applies it.
    ///
    /// Returns `None` once no element is mounted.
    pub async fn next_event(&mut self) -> Option<MediaEvent> {
        let event = self.events.as_mut()?.recv().await?;
        self.handle_event(event.clone());
        Some(event)
    }

    fn notify(&self, notification: TransportNotification) {
        if let Some(sender) = &self.notifications {
            // Receiver gone means nobody is listening any more.
            let _ = sender.send(notification);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.unmount();
    }
}
