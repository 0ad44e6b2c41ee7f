//! Video player composing readiness and transport
//!
//! A reference goes in, the readiness controller resolves and checks it, and
//! the stream URL only reaches the media element once playback is allowed.

use std::sync::Arc;

use tracing::debug;

use crate::config::KineticConfig;
use crate::media::{ApiEndpoints, MediaReference, PlaybackTarget};
use crate::playback::{MediaElement, Transport};
use crate::readiness::{
    HttpTranscodeStatusClient, ReadinessController, ReadinessStatus, TranscodeStatusClient,
};

#[derive(Debug)]
pub struct VideoPlayer {
    controller: ReadinessController,
    transport: Transport,
    attached: Option<String>,
    autoplay: bool,
}

impl VideoPlayer {
    pub fn new(controller: ReadinessController, transport: Transport) -> Self {
        Self {
            controller,
            transport,
            attached: None,
            autoplay: false,
        }
    }

    /// Player talking to the configured backend over HTTP.
    pub fn from_config(config: &KineticConfig, element: Box<dyn MediaElement>) -> Self {
        let client: Arc<dyn TranscodeStatusClient> =
            Arc::new(HttpTranscodeStatusClient::new(&config.api));
        let controller = ReadinessController::new(
            client,
            ApiEndpoints::new(&config.api.base_url),
            config.readiness.clone(),
        );
        let mut transport = Transport::new();
        transport.mount(element);
        Self::new(controller, transport)
    }

    /// Starts playback as soon as the source is attached.
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Switches to a new reference.
    ///
    /// The current session is discarded before the readiness cycle restarts.
    /// Must be called within a Tokio runtime.
    pub fn load(&mut self, reference: Option<&MediaReference>) -> Option<PlaybackTarget> {
        self.transport.unload();
        self.attached = None;

        let target = self.controller.set_reference(reference);
        self.sync();
        target
    }

    /// Attaches the resolved URL once readiness allows it.
    ///
    /// Returns true when a source is attached. Safe to call repeatedly.
    pub fn sync(&mut self) -> bool {
        if self.attached.is_some() {
            return true;
        }
        if !self.transport.is_mounted() || !self.controller.playback_allowed() {
            return false;
        }
        let Some(target) = self.controller.target() else {
            return false;
        };

        let stream_url = target.stream_url.clone();
        debug!("Attaching {stream_url} to the media element");
        self.transport.load(&stream_url);
        self.attached = Some(stream_url);
        if self.autoplay {
            self.transport.play();
        }
        true
    }

    /// Waits for the readiness cycle to settle, then attaches if allowed.
    pub async fn wait_until_playable(&mut self) -> (ReadinessStatus, bool) {
        let status = self.controller.wait_until_settled().await;
        let attached = self.sync();
        (status, attached)
    }

    pub fn readiness(&self) -> ReadinessStatus {
        self.controller.status()
    }

    pub fn controller(&self) -> &ReadinessController {
        &self.controller
    }

    /// Source currently attached to the media element.
    pub fn attached_source(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }
}
