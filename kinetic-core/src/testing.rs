//! Test doubles for the readiness client and media element.
//!
//! Enabled for this crate's tests and, through the `test-utils` feature, for
//! downstream integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::playback::{MediaElement, MediaEvent, MediaEventSink, PlaybackError};
use crate::readiness::{ReadinessCheckError, TranscodeStatus, TranscodeStatusClient};

type ScriptedResponse = Result<TranscodeStatus, ReadinessCheckError>;

/// Status client answering from a script.
///
/// Queued responses are consumed in order; once the queue is empty the
/// repeated response (if any) is returned, otherwise a network error. The
/// response is taken when the call starts, before any configured latency.
#[derive(Debug, Default)]
pub struct ScriptedStatusClient {
    inner: Mutex<ScriptState>,
}

#[derive(Debug, Default)]
struct ScriptState {
    queue: VecDeque<ScriptedResponse>,
    repeat: Option<ScriptedResponse>,
    latency: HashMap<String, Duration>,
    calls: Vec<String>,
}

impl ScriptedStatusClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, status: TranscodeStatus) {
        self.inner.lock().queue.push_back(Ok(status));
    }

    pub fn push_err(&self, error: ReadinessCheckError) {
        self.inner.lock().queue.push_back(Err(error));
    }

    /// Response used whenever the queue is empty.
    pub fn repeat_ok(&self, status: TranscodeStatus) {
        self.inner.lock().repeat = Some(Ok(status));
    }

    /// Delays responses for `asset`.
    pub fn set_latency(&self, asset: &str, latency: Duration) {
        self.inner.lock().latency.insert(asset.to_string(), latency);
    }

    /// Assets requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }
}

#[async_trait]
impl TranscodeStatusClient for ScriptedStatusClient {
    async fn check_status(&self, asset: &str) -> Result<TranscodeStatus, ReadinessCheckError> {
        let (response, latency) = {
            let mut state = self.inner.lock();
            state.calls.push(asset.to_string());
            let response = state
                .queue
                .pop_front()
                .or_else(|| state.repeat.clone())
                .unwrap_or_else(|| {
                    Err(ReadinessCheckError::Network {
                        url: asset.to_string(),
                        reason: "no scripted response".to_string(),
                    })
                });
            (response, state.latency.get(asset).copied())
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        response
    }
}

/// Media element that records commands and lets tests emit events.
///
/// Clones share state, so a test keeps one clone as a handle while the
/// transport owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingMediaElement {
    inner: Arc<Mutex<ElementState>>,
}

/// Everything the element has been told to do.
#[derive(Debug, Clone, Default)]
pub struct ElementState {
    pub source: Option<String>,
    pub loads: usize,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub current_time: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub fullscreen: bool,
    pub reject_play: Option<String>,
    pub reject_fullscreen: bool,
    sink: Option<MediaEventSink>,
}

impl RecordingMediaElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded state.
    pub fn state(&self) -> ElementState {
        self.inner.lock().clone()
    }

    /// Makes subsequent `play()` calls fail, as an autoplay policy would.
    pub fn reject_play(&self, reason: &str) {
        self.inner.lock().reject_play = Some(reason.to_string());
    }

    pub fn allow_play(&self) {
        self.inner.lock().reject_play = None;
    }

    pub fn reject_fullscreen(&self) {
        self.inner.lock().reject_fullscreen = true;
    }

    /// Check if a transport listener is currently attached.
    pub fn has_listener(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    /// Emits a native event to the attached listener.
    ///
    /// Returns false when no listener is attached.
    pub fn emit(&self, event: MediaEvent) -> bool {
        match &self.inner.lock().sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }
}

impl MediaElement for RecordingMediaElement {
    fn load(&mut self, src: &str) {
        let mut state = self.inner.lock();
        state.source = Some(src.to_string());
        state.loads += 1;
        state.current_time = 0.0;
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let mut state = self.inner.lock();
        state.play_calls += 1;
        match &state.reject_play {
            Some(reason) => Err(PlaybackError::PlayRejected {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn pause(&mut self) {
        self.inner.lock().pause_calls += 1;
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.inner.lock().current_time = seconds;
    }

    fn set_volume(&mut self, volume: f64) {
        self.inner.lock().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.inner.lock().muted = muted;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.inner.lock().playback_rate = rate;
    }

    fn request_fullscreen(&mut self) -> Result<(), PlaybackError> {
        let mut state = self.inner.lock();
        if state.reject_fullscreen {
            return Err(PlaybackError::FullscreenUnavailable {
                reason: "fullscreen not permitted".to_string(),
            });
        }
        state.fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), PlaybackError> {
        self.inner.lock().fullscreen = false;
        Ok(())
    }

    fn attach_listener(&mut self, sink: MediaEventSink) {
        self.inner.lock().sink = Some(sink);
    }

    fn detach_listener(&mut self) {
        self.inner.lock().sink = None;
    }
}
