//! Playback readiness controller
//!
//! Owns the readiness cycle for one player: resolve the reference, check
//! transcode status once, poll while the backend transcodes, publish every
//! transition on a watch channel.
//!
//! Each reference gets a generation number. The running cycle only publishes
//! while its generation is current, so a late response for a previous
//! reference is discarded instead of overwriting the new one.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::client::TranscodeStatusClient;
use super::poller::{PollOutcome, PollTask, poll_until_ready};
use super::state::ReadinessStatus;
use crate::config::ReadinessConfig;
use crate::media::{ApiEndpoints, MediaReference, PlaybackTarget};

/// Drives the readiness state machine for one player instance.
#[derive(Debug)]
pub struct ReadinessController {
    client: Arc<dyn TranscodeStatusClient>,
    endpoints: ApiEndpoints,
    config: ReadinessConfig,
    status: Arc<watch::Sender<ReadinessStatus>>,
    generation: Arc<AtomicU64>,
    task: Option<PollTask>,
    target: Option<PlaybackTarget>,
}

/// Publishes status for one generation and goes silent once superseded.
#[derive(Debug, Clone)]
struct StatusPublisher {
    generation: u64,
    current: Arc<AtomicU64>,
    status: Arc<watch::Sender<ReadinessStatus>>,
}

impl StatusPublisher {
    /// Returns false when this generation is stale and nothing was published.
    fn publish(&self, next: ReadinessStatus) -> bool {
        let mut published = false;
        self.status.send_if_modified(|slot| {
            if self.current.load(Ordering::SeqCst) != self.generation {
                return false;
            }
            published = true;
            if *slot == next {
                return false;
            }
            *slot = next;
            true
        });
        published
    }
}

impl ReadinessController {
    pub fn new(
        client: Arc<dyn TranscodeStatusClient>,
        endpoints: ApiEndpoints,
        config: ReadinessConfig,
    ) -> Self {
        let (status, _) = watch::channel(ReadinessStatus::unknown());
        Self {
            client,
            endpoints,
            config,
            status: Arc::new(status),
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
            target: None,
        }
    }

    /// Resolves a reference to its playback target without side effects.
    pub fn resolve_url(&self, reference: &MediaReference) -> Option<PlaybackTarget> {
        reference.resolve(&self.endpoints)
    }

    /// Switches to a new reference, restarting the readiness cycle.
    ///
    /// Any running check or poll loop for the previous reference is cancelled
    /// and the state resets to `Unknown` before anything else happens. An
    /// empty reference leaves the controller idle. References without an
    /// asset key (URLs outside the backend) are ready immediately.
    ///
    /// Must be called within a Tokio runtime.
    pub fn set_reference(&mut self, reference: Option<&MediaReference>) -> Option<PlaybackTarget> {
        self.stop_polling();
        let publisher = self.reset();

        self.target = reference.and_then(|reference| self.resolve_url(reference));
        let Some(target) = self.target.clone() else {
            debug!("No playable reference; readiness stays unknown");
            return None;
        };

        let Some(asset) = target.asset_key.clone() else {
            debug!(
                "External stream {} needs no transcode check",
                target.stream_url
            );
            publisher.publish(ReadinessStatus::ready(0));
            return Some(target);
        };

        publisher.publish(ReadinessStatus::checking());
        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        self.task = Some(PollTask::spawn(run_readiness_cycle(
            client, asset, config, publisher,
        )));

        Some(target)
    }

    /// Cancels the running check or poll loop, if any. Idempotent.
    pub fn stop_polling(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
        }
    }

    /// Check if a status check or poll loop is currently running.
    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(PollTask::is_active)
    }

    /// Latest published status.
    pub fn status(&self) -> ReadinessStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<ReadinessStatus> {
        self.status.subscribe()
    }

    /// Target resolved from the current reference.
    pub fn target(&self) -> Option<&PlaybackTarget> {
        self.target.as_ref()
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Check if the current status lets the resolved URL be played.
    pub fn playback_allowed(&self) -> bool {
        self.target.is_some()
            && self
                .status
                .borrow()
                .allows_playback(self.config.direct_play_on_check_failure)
    }

    /// Waits until the cycle for the current reference settles.
    ///
    /// Returns immediately when nothing is pending.
    pub async fn wait_until_settled(&self) -> ReadinessStatus {
        let mut receiver = self.subscribe();
        match receiver
            .wait_for(|status| status.state.is_settled())
            .await
        {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }

    /// Bumps the generation and publishes `Unknown` in one step.
    fn reset(&mut self) -> StatusPublisher {
        let mut generation = 0;
        self.status.send_modify(|slot| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *slot = ReadinessStatus::unknown();
        });

        StatusPublisher {
            generation,
            current: Arc::clone(&self.generation),
            status: Arc::clone(&self.status),
        }
    }
}

impl Drop for ReadinessController {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

async fn run_readiness_cycle(
    client: Arc<dyn TranscodeStatusClient>,
    asset: String,
    config: ReadinessConfig,
    publisher: StatusPublisher,
) {
    let status = match client.check_status(&asset).await {
        Ok(status) => status,
        Err(error) => {
            warn!("Transcode status check for {asset} failed, direct playback may be attempted: {error}");
            publisher.publish(ReadinessStatus::check_failed());
            return;
        }
    };

    if status.is_ready() {
        info!("Asset {asset} is ready to stream");
        publisher.publish(ReadinessStatus::ready(0));
        return;
    }

    debug!(
        "Asset {asset} needs transcoding (in progress: {})",
        status.transcoding_in_progress
    );
    if !publisher.publish(ReadinessStatus::transcoding(
        status.transcoding_in_progress,
        0,
    )) {
        return;
    }

    let outcome = poll_until_ready(
        client.as_ref(),
        &asset,
        &config,
        status.transcoding_in_progress,
        |update| {
            if publisher.publish(update) {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        },
    )
    .await;

    match outcome {
        PollOutcome::Ready { attempts } => {
            info!("Asset {asset} is ready to stream after {attempts} poll(s)");
        }
        PollOutcome::TimedOut { attempts } => {
            warn!("Gave up waiting for {asset} after {attempts} poll(s)");
        }
        PollOutcome::Stopped { attempts } => {
            debug!("Polling for {asset} superseded after {attempts} poll(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready};
    use url::Url;

    use super::*;
    use crate::readiness::client::TranscodeStatus;
    use crate::readiness::{ReadinessCheckError, ReadinessState};
    use crate::testing::ScriptedStatusClient;

    fn controller_with(client: Arc<ScriptedStatusClient>, max_poll_attempts: u32) -> ReadinessController {
        let endpoints = ApiEndpoints::new(&Url::parse("http://localhost:8000").unwrap());
        let config = ReadinessConfig {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts,
            direct_play_on_check_failure: true,
        };
        ReadinessController::new(client, endpoints, config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_reference_issues_no_check() {
        let client = Arc::new(ScriptedStatusClient::new());
        let mut controller = controller_with(client.clone(), 10);

        assert_eq!(controller.set_reference(None), None);
        assert_eq!(
            controller.set_reference(Some(&MediaReference::default())),
            None
        );
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(client.call_count(), 0);
        assert_eq!(controller.status().state, ReadinessState::Unknown);
        assert!(!controller.is_polling());
        assert!(!controller.playback_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_play_asset_becomes_ready_without_transcoding() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.push_ok(TranscodeStatus::default());
        let mut controller = controller_with(client.clone(), 10);

        let mut receiver = controller.subscribe();
        controller.set_reference(Some(&MediaReference::from_path("a.mp4")));

        let mut seen = vec![receiver.borrow_and_update().state];
        while receiver.changed().await.is_ok() {
            let state = receiver.borrow_and_update().state;
            seen.push(state);
            if state == ReadinessState::Ready {
                break;
            }
        }

        assert!(!seen.contains(&ReadinessState::Transcoding));
        assert_eq!(seen.last(), Some(&ReadinessState::Ready));
        assert_eq!(client.call_count(), 1);
        assert!(controller.playback_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_progress_then_ready_on_next_poll() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.push_ok(TranscodeStatus::pending(true));
        client.push_ok(TranscodeStatus::default());
        client.repeat_ok(TranscodeStatus::pending(true));
        let mut controller = controller_with(client.clone(), 180);

        let started = tokio::time::Instant::now();
        controller.set_reference(Some(&MediaReference::from_path("a.mp4")));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = controller.status();
        assert_eq!(status.state, ReadinessState::Transcoding);
        assert!(status.message.unwrap().contains("being prepared"));
        assert!(controller.is_polling());

        let settled = controller.wait_until_settled().await;
        assert_eq!(settled.state, ReadinessState::Ready);
        assert_eq!(settled.attempts, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(client.call_count(), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.call_count(), 2);
        assert!(!controller.is_polling());
        assert_eq!(client.calls(), vec!["a.mp4".to_string(), "a.mp4".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_settled_pends_while_transcoding() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.push_ok(TranscodeStatus::pending(true));
        client.push_ok(TranscodeStatus::cached());
        let mut controller = controller_with(client, 180);

        controller.set_reference(Some(&MediaReference::from_path("a.mkv")));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut settled = tokio_test::task::spawn(controller.wait_until_settled());
        assert_pending!(settled.poll());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(settled.is_woken());
        let status = assert_ready!(settled.poll());
        assert_eq!(status.state, ReadinessState::Ready);
        assert_eq!(status.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_in_progress_enters_transcoding_and_polls() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.push_ok(TranscodeStatus::pending(false));
        client.repeat_ok(TranscodeStatus::pending(true));
        let mut controller = controller_with(client.clone(), 180);

        controller.set_reference(Some(&MediaReference::from_path("b.avi")));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = controller.status();
        assert_eq!(status.state, ReadinessState::Transcoding);
        assert!(status.message.unwrap().contains("Starting conversion"));
        assert!(controller.is_polling());
        assert!(!controller.playback_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_falls_back_to_unknown() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.push_err(ReadinessCheckError::UnexpectedStatus { status: 500 });
        let mut controller = controller_with(client.clone(), 180);

        let reference = MediaReference::from_id("42");
        let target = controller.set_reference(Some(&reference)).unwrap();
        let settled = controller.wait_until_settled().await;

        assert_eq!(settled.state, ReadinessState::Unknown);
        assert_eq!(settled.message, None);
        assert!(settled.check_failed);
        assert!(controller.playback_allowed());
        assert_eq!(
            controller.resolve_url(&reference).map(|t| t.stream_url),
            Some(target.stream_url)
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reaches_error_at_max_attempts() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.repeat_ok(TranscodeStatus::pending(true));
        let mut controller = controller_with(client.clone(), 4);

        controller.set_reference(Some(&MediaReference::from_path("huge.mkv")));
        let settled = controller.wait_until_settled().await;

        assert_eq!(settled.state, ReadinessState::Error);
        assert_eq!(settled.attempts, 4);
        assert!(settled.message.unwrap().contains("timed out"));
        // one initial check plus exactly four polls
        assert_eq!(client.call_count(), 5);
        assert!(!controller.playback_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_change_cancels_previous_cycle() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.repeat_ok(TranscodeStatus::pending(true));
        let mut controller = controller_with(client.clone(), 180);

        controller.set_reference(Some(&MediaReference::from_path("first.mkv")));
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(controller.status().state, ReadinessState::Transcoding);

        client.clear_calls();
        client.push_ok(TranscodeStatus::default());
        controller.set_reference(Some(&MediaReference::from_path("second.mp4")));
        let settled = controller.wait_until_settled().await;
        assert_eq!(settled.state, ReadinessState::Ready);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(client.calls(), vec!["second.mp4".to_string()]);
        assert_eq!(controller.status().state, ReadinessState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_publisher_is_silenced() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.repeat_ok(TranscodeStatus::pending(true));
        let mut controller = controller_with(client.clone(), 180);

        // A publisher from a superseded generation, as a late cycle would hold.
        let stale = controller.reset();
        controller.set_reference(Some(&MediaReference::from_path("other.mkv")));
        assert!(!stale.publish(ReadinessStatus::ready(0)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(controller.status().state, ReadinessState::Transcoding);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_for_previous_reference_never_lands() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.set_latency("slow.mkv", Duration::from_secs(5));
        client.push_ok(TranscodeStatus::default());
        client.push_ok(TranscodeStatus::pending(true));
        client.repeat_ok(TranscodeStatus::pending(true));
        let mut controller = controller_with(client.clone(), 180);

        controller.set_reference(Some(&MediaReference::from_path("slow.mkv")));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.status().state, ReadinessState::Checking);

        controller.set_reference(Some(&MediaReference::from_path("fresh.mkv")));
        tokio::time::sleep(Duration::from_secs(10)).await;

        let status = controller.status();
        assert_eq!(status.state, ReadinessState::Transcoding);
        assert_eq!(
            controller.target().and_then(|t| t.asset_key.as_deref()),
            Some("fresh.mkv")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_happens_before_new_check() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.repeat_ok(TranscodeStatus::default());
        let mut controller = controller_with(client.clone(), 180);

        controller.set_reference(Some(&MediaReference::from_path("a.mp4")));
        controller.wait_until_settled().await;
        assert_eq!(controller.status().state, ReadinessState::Ready);

        let mut receiver = controller.subscribe();
        receiver.borrow_and_update();
        controller.set_reference(None);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().state, ReadinessState::Unknown);
        assert_eq!(controller.target(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_url_is_ready_immediately() {
        let client = Arc::new(ScriptedStatusClient::new());
        let mut controller = controller_with(client.clone(), 180);

        controller.set_reference(Some(&MediaReference::from_url(
            "https://cdn.example.com/warmup.mp4",
        )));

        assert_eq!(controller.status().state, ReadinessState::Ready);
        assert!(controller.playback_allowed());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_polling() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.repeat_ok(TranscodeStatus::pending(true));
        let mut controller = controller_with(client.clone(), 180);

        controller.set_reference(Some(&MediaReference::from_path("a.mkv")));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let calls = client.call_count();
        drop(controller);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(client.call_count(), calls);
    }
}
