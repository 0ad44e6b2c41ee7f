//! In-memory transcode backend
//!
//! Tracks one job per asset and advances it on every status check, so the
//! readiness protocol can be exercised without a real transcoder. Registered
//! assets are kept for the backend's lifetime; jobs created for unknown assets
//! live in a bounded LRU.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kinetic_core::readiness::{ReadinessCheckError, TranscodeStatus, TranscodeStatusClient};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

/// How a simulated asset behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AssetProfile {
    /// Streams as-is, no transcoding needed
    Direct,
    /// Needs transcoding. The job starts on the first status check or stream
    /// request and the cached copy exists after `checks_until_cached` further
    /// status checks.
    Transcode { checks_until_cached: u32 },
    /// Status endpoint answers with this HTTP status
    Failing { status: u16 },
}

/// Whether the stream endpoint can serve an asset right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAvailability {
    Available,
    Transcoding,
    Failed { status: u16 },
}

/// Per-asset job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscodeJob {
    pub asset: String,
    pub profile: AssetProfile,
    /// Status checks answered for this asset
    pub status_checks: u32,
    /// Checks seen since the job started
    pub progress: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TranscodeJob {
    fn new(asset: &str, profile: AssetProfile) -> Self {
        Self {
            asset: asset.to_string(),
            profile,
            status_checks: 0,
            progress: 0,
            started_at: None,
            completed_at: None,
        }
    }

    fn is_running(&self) -> bool {
        self.started_at.is_some() && self.completed_at.is_none()
    }

    fn start(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            info!("Simulated transcode started for {}", self.asset);
            self.started_at = Some(now);
        }
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        if self.completed_at.is_none() {
            info!("Simulated transcode finished for {}", self.asset);
            self.completed_at = Some(now);
        }
    }

    fn observe(&mut self, now: DateTime<Utc>) -> Result<TranscodeStatus, u16> {
        self.status_checks += 1;

        match self.profile {
            AssetProfile::Direct => Ok(TranscodeStatus::default()),
            AssetProfile::Failing { status } => Err(status),
            AssetProfile::Transcode {
                checks_until_cached,
            } => {
                if self.completed_at.is_some() {
                    return Ok(TranscodeStatus::cached());
                }

                let was_running = self.started_at.is_some();
                if was_running {
                    self.progress += 1;
                } else {
                    self.start(now);
                }

                if self.progress >= checks_until_cached {
                    self.finish(now);
                    Ok(TranscodeStatus::cached())
                } else {
                    Ok(TranscodeStatus::pending(was_running))
                }
            }
        }
    }
}

/// Jobs created for unregistered assets before the oldest is evicted.
pub const DEFAULT_IMPLICIT_JOB_CAPACITY: usize = 256;

#[derive(Debug)]
struct JobTable {
    registered: HashMap<String, TranscodeJob>,
    implicit: LruCache<String, TranscodeJob>,
}

impl JobTable {
    fn new(implicit_capacity: NonZeroUsize) -> Self {
        Self {
            registered: HashMap::new(),
            implicit: LruCache::new(implicit_capacity),
        }
    }

    /// Job for `asset`, creating an implicit one with `profile` if unknown.
    fn entry(&mut self, asset: &str, profile: AssetProfile) -> &mut TranscodeJob {
        if let Some(job) = self.registered.get_mut(asset) {
            return job;
        }
        self.implicit
            .get_or_insert_mut(asset.to_string(), || TranscodeJob::new(asset, profile))
    }

    fn get(&self, asset: &str) -> Option<&TranscodeJob> {
        self.registered
            .get(asset)
            .or_else(|| self.implicit.peek(asset))
    }

    fn get_mut(&mut self, asset: &str) -> Option<&mut TranscodeJob> {
        match self.registered.get_mut(asset) {
            Some(job) => Some(job),
            None => self.implicit.peek_mut(asset),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &TranscodeJob> {
        self.registered
            .values()
            .chain(self.implicit.iter().map(|(_, job)| job))
    }
}

/// Simulated backend answering transcode status and stream availability.
#[derive(Debug)]
pub struct SimulatedTranscodeBackend {
    jobs: Mutex<JobTable>,
    default_profile: AssetProfile,
    latency: Option<Duration>,
}

impl Default for SimulatedTranscodeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTranscodeBackend {
    /// Backend where unregistered assets stream directly.
    pub fn new() -> Self {
        let capacity =
            NonZeroUsize::new(DEFAULT_IMPLICIT_JOB_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            jobs: Mutex::new(JobTable::new(capacity)),
            default_profile: AssetProfile::Direct,
            latency: None,
        }
    }

    /// Backend preloaded with a small library covering each profile.
    pub fn with_demo_library() -> Self {
        let backend = Self::new();
        backend.register_direct("exercises/push-up.mp4");
        backend.register_transcode("exercises/squat.mkv", 3);
        backend.register_transcode("exercises/deadlift.avi", 10);
        backend.register("exercises/broken.mov", AssetProfile::Failing { status: 500 });
        backend
    }

    /// Profile applied to assets seen for the first time.
    pub fn with_default_profile(mut self, profile: AssetProfile) -> Self {
        self.default_profile = profile;
        self
    }

    /// Caps the jobs kept for unregistered assets. Drops existing implicit jobs.
    pub fn with_implicit_capacity(self, capacity: NonZeroUsize) -> Self {
        self.jobs.lock().implicit = LruCache::new(capacity);
        self
    }

    /// Delay applied to every status check made through the client trait.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Registers `asset`, replacing any existing job for it.
    pub fn register(&self, asset: &str, profile: AssetProfile) {
        debug!("Registering simulated asset {asset} as {profile:?}");
        let mut jobs = self.jobs.lock();
        jobs.implicit.pop(asset);
        jobs.registered
            .insert(asset.to_string(), TranscodeJob::new(asset, profile));
    }

    pub fn register_direct(&self, asset: &str) {
        self.register(asset, AssetProfile::Direct);
    }

    pub fn register_transcode(&self, asset: &str, checks_until_cached: u32) {
        self.register(
            asset,
            AssetProfile::Transcode {
                checks_until_cached,
            },
        );
    }

    /// Marks a transcoding job as finished. Returns false for other profiles.
    pub fn complete(&self, asset: &str) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(asset) {
            Some(job) if matches!(job.profile, AssetProfile::Transcode { .. }) => {
                let now = Utc::now();
                job.start(now);
                job.finish(now);
                true
            }
            _ => false,
        }
    }

    /// Answers one status check, advancing the asset's job.
    ///
    /// # Errors
    /// Returns the HTTP status of a failing asset.
    pub fn observe_status(&self, asset: &str) -> Result<TranscodeStatus, u16> {
        let mut jobs = self.jobs.lock();
        jobs.entry(asset, self.default_profile).observe(Utc::now())
    }

    /// Checks whether the stream endpoint can serve `asset`.
    ///
    /// Requesting a stream that still needs transcoding starts the job.
    pub fn open_stream(&self, asset: &str) -> StreamAvailability {
        let mut jobs = self.jobs.lock();
        let job = jobs.entry(asset, self.default_profile);

        match job.profile {
            AssetProfile::Direct => StreamAvailability::Available,
            AssetProfile::Failing { status } => StreamAvailability::Failed { status },
            AssetProfile::Transcode { .. } if job.completed_at.is_some() => {
                StreamAvailability::Available
            }
            AssetProfile::Transcode { .. } => {
                job.start(Utc::now());
                StreamAvailability::Transcoding
            }
        }
    }

    pub fn job(&self, asset: &str) -> Option<TranscodeJob> {
        self.jobs.lock().get(asset).cloned()
    }

    /// All known jobs ordered by asset.
    pub fn jobs(&self) -> Vec<TranscodeJob> {
        let mut jobs: Vec<_> = self.jobs.lock().iter().cloned().collect();
        jobs.sort_by(|a, b| a.asset.cmp(&b.asset));
        jobs
    }

    /// Number of transcodes currently running.
    pub fn active_jobs(&self) -> usize {
        self.jobs
            .lock()
            .iter()
            .filter(|job| job.is_running())
            .count()
    }
}

#[async_trait]
impl TranscodeStatusClient for SimulatedTranscodeBackend {
    async fn check_status(&self, asset: &str) -> Result<TranscodeStatus, ReadinessCheckError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.observe_status(asset)
            .map_err(|status| ReadinessCheckError::UnexpectedStatus { status })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kinetic_core::config::ReadinessConfig;
    use kinetic_core::media::{ApiEndpoints, MediaReference};
    use kinetic_core::readiness::{ReadinessController, ReadinessState};

    use super::*;

    #[test]
    fn test_direct_asset_is_always_ready() {
        let backend = SimulatedTranscodeBackend::new();
        for _ in 0..3 {
            assert_eq!(
                backend.observe_status("any.mp4"),
                Ok(TranscodeStatus::default())
            );
        }
        assert_eq!(backend.job("any.mp4").unwrap().status_checks, 3);
        assert_eq!(backend.active_jobs(), 0);
    }

    #[test]
    fn test_transcode_progresses_with_checks() {
        let backend = SimulatedTranscodeBackend::new();
        backend.register_transcode("a.mkv", 2);

        assert_eq!(
            backend.observe_status("a.mkv"),
            Ok(TranscodeStatus::pending(false))
        );
        assert_eq!(backend.active_jobs(), 1);
        assert_eq!(
            backend.observe_status("a.mkv"),
            Ok(TranscodeStatus::pending(true))
        );
        assert_eq!(
            backend.observe_status("a.mkv"),
            Ok(TranscodeStatus::cached())
        );
        assert_eq!(
            backend.observe_status("a.mkv"),
            Ok(TranscodeStatus::cached())
        );

        let job = backend.job("a.mkv").unwrap();
        assert!(job.started_at.is_some());
        assert!(job.completed_at >= job.started_at);
        assert_eq!(backend.active_jobs(), 0);
    }

    #[test]
    fn test_stream_request_starts_job() {
        let backend = SimulatedTranscodeBackend::new();
        backend.register_transcode("a.mkv", 1);

        assert_eq!(backend.open_stream("a.mkv"), StreamAvailability::Transcoding);
        assert_eq!(
            backend.observe_status("a.mkv"),
            Ok(TranscodeStatus::cached())
        );
        assert_eq!(backend.open_stream("a.mkv"), StreamAvailability::Available);
    }

    #[test]
    fn test_failing_and_forced_completion() {
        let backend = SimulatedTranscodeBackend::new();
        backend.register("bad.mov", AssetProfile::Failing { status: 503 });
        backend.register_transcode("slow.mkv", 100);

        assert_eq!(backend.observe_status("bad.mov"), Err(503));
        assert_eq!(
            backend.open_stream("bad.mov"),
            StreamAvailability::Failed { status: 503 }
        );
        assert!(!backend.complete("bad.mov"));
        assert!(!backend.complete("missing.mp4"));

        assert!(backend.complete("slow.mkv"));
        assert_eq!(
            backend.observe_status("slow.mkv"),
            Ok(TranscodeStatus::cached())
        );
    }

    #[test]
    fn test_default_profile_applies_to_new_assets() {
        let backend = SimulatedTranscodeBackend::new().with_default_profile(
            AssetProfile::Transcode {
                checks_until_cached: 5,
            },
        );
        assert_eq!(
            backend.observe_status("new.mkv"),
            Ok(TranscodeStatus::pending(false))
        );
        let assets: Vec<_> = backend.jobs().into_iter().map(|job| job.asset).collect();
        assert_eq!(assets, vec!["new.mkv".to_string()]);
    }

    #[test]
    fn test_unregistered_assets_are_capped() {
        let backend = SimulatedTranscodeBackend::new()
            .with_implicit_capacity(NonZeroUsize::new(2).unwrap());
        backend.register_transcode("kept.mkv", 1);

        for asset in ["a.mp4", "b.mp4", "c.mp4"] {
            backend.observe_status(asset).unwrap();
        }
        assert_eq!(backend.job("a.mp4"), None);
        assert_eq!(backend.job("c.mp4").unwrap().status_checks, 1);
        assert!(backend.job("kept.mkv").is_some());

        backend.observe_status("b.mp4").unwrap();
        backend.observe_status("d.mp4").unwrap();
        let assets: Vec<_> = backend.jobs().into_iter().map(|job| job.asset).collect();
        assert_eq!(assets, vec!["b.mp4", "d.mp4", "kept.mkv"]);
    }

    #[test]
    fn test_registering_promotes_implicit_job() {
        let backend = SimulatedTranscodeBackend::new()
            .with_implicit_capacity(NonZeroUsize::new(1).unwrap());
        backend.observe_status("a.mkv").unwrap();

        backend.register_transcode("a.mkv", 3);
        backend.observe_status("other.mp4").unwrap();

        let job = backend.job("a.mkv").unwrap();
        assert_eq!(job.status_checks, 0);
        assert_eq!(
            job.profile,
            AssetProfile::Transcode {
                checks_until_cached: 3
            }
        );
    }

    #[test]
    fn test_client_trait_maps_failures() {
        let backend = SimulatedTranscodeBackend::with_demo_library();
        let error = tokio_test::block_on(backend.check_status("exercises/broken.mov")).unwrap_err();
        assert_eq!(error, ReadinessCheckError::UnexpectedStatus { status: 500 });
        assert_eq!(
            tokio_test::block_on(backend.check_status("exercises/push-up.mp4")),
            Ok(TranscodeStatus::default())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drives_controller_to_ready() {
        let backend = Arc::new(
            SimulatedTranscodeBackend::with_demo_library().with_latency(Duration::from_millis(50)),
        );
        let endpoints = ApiEndpoints::new(&"http://localhost:8000".parse().unwrap());
        let mut controller =
            ReadinessController::new(backend.clone(), endpoints, ReadinessConfig::default());

        controller.set_reference(Some(&MediaReference::from_path("exercises/squat.mkv")));
        let status = controller.wait_until_settled().await;

        assert_eq!(status.state, ReadinessState::Ready);
        assert_eq!(status.attempts, 3);
        assert_eq!(backend.job("exercises/squat.mkv").unwrap().status_checks, 4);
    }
}
