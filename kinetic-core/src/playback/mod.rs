//! Transport and control surface over a native media element
//!
//! The [`Transport`] owns the mounted [`MediaElement`] and the transient
//! [`PlaybackSession`]. Native events arrive through a subscription that is
//! installed on mount and removed on unmount, so no listener outlives the
//! transport that created it.

pub mod element;
pub mod error;
pub mod session;
pub mod transport;

pub use element::{MediaElement, MediaErrorCode, MediaEvent, MediaEventSink};
pub use error::PlaybackError;
pub use session::PlaybackSession;
pub use transport::{Transport, TransportNotification};
