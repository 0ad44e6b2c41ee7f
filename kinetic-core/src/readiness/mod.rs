//! On-demand transcoding readiness
//!
//! Decides, without blocking the caller, whether a video can be streamed
//! right away or has to wait for the backend to transcode it. Status check
//! failures degrade to direct playback instead of blocking the user;
//! polling is bounded and cancellable.

pub mod client;
pub mod controller;
pub mod poller;
pub mod state;

pub use client::{
    HttpTranscodeStatusClient, ReadinessCheckError, TranscodeStatus, TranscodeStatusClient,
};
pub use controller::ReadinessController;
pub use poller::{PollOutcome, PollTask, begin_polling, poll_until_ready};
pub use state::{ReadinessState, ReadinessStatus};
