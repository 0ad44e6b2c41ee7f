//! Media references and backend video endpoints
//!
//! A [`MediaReference`] names a video the way callers know it (explicit URL,
//! library path or opaque id). Resolution turns it into a [`PlaybackTarget`]
//! against the backend's [`ApiEndpoints`].

pub mod endpoints;
pub mod reference;

pub use endpoints::ApiEndpoints;
pub use reference::{MediaReference, PlaybackTarget, resolve_url};
