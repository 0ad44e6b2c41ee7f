//! Interval polling of transcode status
//!
//! Polling runs as a spawned task owned through a [`PollTask`] handle.
//! Dropping or cancelling the handle aborts the task, so a poll loop can
//! never outlive the player that started it.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use super::client::TranscodeStatusClient;
use super::state::ReadinessStatus;
use crate::config::ReadinessConfig;

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Asset became streamable after this many poll requests
    Ready { attempts: u32 },
    /// Attempt budget exhausted
    TimedOut { attempts: u32 },
    /// Update callback asked to stop
    Stopped { attempts: u32 },
}

/// Handle to a running poll task.
#[derive(Debug, Default)]
pub struct PollTask {
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    /// Spawns `future` as the poll task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }

    /// Aborts the task. Calling it again is a no-op.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Check if the task is still running.
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Re-checks `asset` every `poll_interval` until it is ready or the attempt
/// budget runs out.
///
/// The first request happens one interval after the call. `on_update` sees a
/// transcoding status after every unsuccessful tick and the final ready or
/// timed-out status; returning `ControlFlow::Break` stops the loop.
pub async fn poll_until_ready<F>(
    client: &dyn TranscodeStatusClient,
    asset: &str,
    config: &ReadinessConfig,
    mut in_progress: bool,
    mut on_update: F,
) -> PollOutcome
where
    F: FnMut(ReadinessStatus) -> ControlFlow<()>,
{
    let period = config.poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for attempt in 1..=config.max_poll_attempts {
        ticker.tick().await;

        match client.check_status(asset).await {
            Ok(status) if status.is_ready() => {
                debug!("Asset {asset} ready after {attempt} poll(s)");
                // Nothing left to do either way once ready is reported.
                let _ = on_update(ReadinessStatus::ready(attempt));
                return PollOutcome::Ready { attempts: attempt };
            }
            Ok(status) => {
                in_progress = status.transcoding_in_progress;
            }
            Err(error) => {
                warn!("Poll {attempt} for {asset} failed: {error}");
            }
        }

        if on_update(ReadinessStatus::transcoding(in_progress, attempt)).is_break() {
            return PollOutcome::Stopped { attempts: attempt };
        }
    }

    let attempts = config.max_poll_attempts;
    warn!(
        "Transcoding of {asset} not ready after {attempts} polls ({:?})",
        config.polling_budget()
    );
    let _ = on_update(ReadinessStatus::timed_out(
        attempts,
        config.polling_budget(),
    ));
    PollOutcome::TimedOut { attempts }
}

/// Starts polling `asset` on a background task.
///
/// Must be called within a Tokio runtime.
pub fn begin_polling<F>(
    client: Arc<dyn TranscodeStatusClient>,
    asset: String,
    config: ReadinessConfig,
    on_update: F,
) -> PollTask
where
    F: FnMut(ReadinessStatus) -> ControlFlow<()> + Send + 'static,
{
    PollTask::spawn(async move {
        poll_until_ready(client.as_ref(), &asset, &config, true, on_update).await;
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::readiness::ReadinessState;
    use crate::readiness::client::TranscodeStatus;
    use crate::testing::ScriptedStatusClient;

    fn config(max_poll_attempts: u32) -> ReadinessConfig {
        ReadinessConfig {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts,
            direct_play_on_check_failure: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_when_cache_exists() {
        let client = ScriptedStatusClient::new();
        client.push_ok(TranscodeStatus::pending(true));
        client.push_ok(TranscodeStatus::pending(true));
        client.push_ok(TranscodeStatus::cached());
        client.repeat_ok(TranscodeStatus::pending(true));

        let updates = Mutex::new(Vec::new());
        let outcome = poll_until_ready(&client, "a.mp4", &config(10), true, |status| {
            updates.lock().push(status.state);
            ControlFlow::Continue(())
        })
        .await;

        assert_eq!(outcome, PollOutcome::Ready { attempts: 3 });
        assert_eq!(client.call_count(), 3);
        assert_eq!(
            updates.into_inner(),
            vec![
                ReadinessState::Transcoding,
                ReadinessState::Transcoding,
                ReadinessState::Ready
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_exactly_at_budget() {
        let client = ScriptedStatusClient::new();
        client.repeat_ok(TranscodeStatus::pending(true));

        let started = Instant::now();
        let mut last = None;
        let outcome = poll_until_ready(&client, "slow.mkv", &config(5), true, |status| {
            last = Some(status);
            ControlFlow::Continue(())
        })
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 5 });
        assert_eq!(client.call_count(), 5);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        let last = last.unwrap();
        assert_eq!(last.state, ReadinessState::Error);
        assert_eq!(last.attempts, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_request_failures_count_as_attempts() {
        let client = ScriptedStatusClient::new();
        client.push_err(crate::readiness::ReadinessCheckError::UnexpectedStatus { status: 502 });
        client.push_ok(TranscodeStatus::default());

        let outcome =
            poll_until_ready(&client, "a.mp4", &config(5), true, |_| ControlFlow::Continue(()))
                .await;
        assert_eq!(outcome, PollOutcome::Ready { attempts: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_stops_polling() {
        let client = ScriptedStatusClient::new();
        client.repeat_ok(TranscodeStatus::pending(false));

        let outcome =
            poll_until_ready(&client, "a.mp4", &config(5), false, |_| ControlFlow::Break(()))
                .await;
        assert_eq!(outcome, PollOutcome::Stopped { attempts: 1 });
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_makes_no_further_requests() {
        let client = Arc::new(ScriptedStatusClient::new());
        client.repeat_ok(TranscodeStatus::pending(true));

        let mut task = begin_polling(
            client.clone(),
            "a.mp4".to_string(),
            config(100),
            |_| ControlFlow::Continue(()),
        );
        assert!(task.is_active());

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        let calls = client.call_count();
        assert_eq!(calls, 2);

        task.cancel();
        task.cancel();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(client.call_count(), calls);
        assert!(!task.is_active());
    }
}
