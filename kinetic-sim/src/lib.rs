//! Kinetic Simulation - offline transcode backend
//!
//! An in-memory backend that answers transcode status checks and stream
//! requests the way the real one does, with each asset's behaviour scripted
//! up front. Usable directly as a `TranscodeStatusClient` or over HTTP via
//! the axum router in [`server`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use kinetic_sim::SimulatedTranscodeBackend;
//!
//! # async fn run() -> Result<(), kinetic_sim::ServerError> {
//! let backend = Arc::new(SimulatedTranscodeBackend::with_demo_library());
//! kinetic_sim::server::serve(backend, "127.0.0.1:8000".parse().unwrap()).await
//! # }
//! ```

pub mod backend;
pub mod server;

pub use backend::{AssetProfile, SimulatedTranscodeBackend, StreamAvailability, TranscodeJob};
pub use server::ServerError;
