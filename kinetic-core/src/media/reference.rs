//! Media reference resolution

use serde::{Deserialize, Serialize};

use super::endpoints::ApiEndpoints;

/// Identifies a requestable video.
///
/// Any combination of fields may be set; resolution uses the first populated
/// one in the order explicit URL, asset path, identifier. Blank strings are
/// treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaReference {
    /// Fully formed streaming URL
    pub url: Option<String>,
    /// Asset path relative to the backend video library
    pub path: Option<String>,
    /// Opaque video identifier
    pub id: Option<String>,
}

/// A resolved reference: what to stream and what to ask about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTarget {
    /// URL handed to the media element
    pub stream_url: String,
    /// Key for the transcode-status endpoint; `None` for URLs outside the backend
    pub asset_key: Option<String>,
}

impl MediaReference {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// True when no field carries a usable value.
    pub fn is_empty(&self) -> bool {
        populated(&self.url).is_none()
            && populated_path(&self.path).is_none()
            && populated(&self.id).is_none()
    }

    /// Resolves this reference against the backend endpoints.
    pub fn resolve(&self, endpoints: &ApiEndpoints) -> Option<PlaybackTarget> {
        if let Some(url) = populated(&self.url) {
            return Some(PlaybackTarget {
                stream_url: url.to_string(),
                asset_key: endpoints.asset_from_stream_url(url),
            });
        }

        let asset = populated_path(&self.path).or_else(|| populated(&self.id))?;

        Some(PlaybackTarget {
            stream_url: endpoints.stream_url(asset),
            asset_key: Some(asset.to_string()),
        })
    }
}

impl std::fmt::Display for MediaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(url) = populated(&self.url) {
            write!(f, "url:{url}")
        } else if let Some(path) = populated_path(&self.path) {
            write!(f, "path:{path}")
        } else if let Some(id) = populated(&self.id) {
            write!(f, "id:{id}")
        } else {
            write!(f, "<empty>")
        }
    }
}

/// Resolves an optional reference to the URL that should be played.
///
/// Returns `None` when there is nothing to play.
pub fn resolve_url(reference: Option<&MediaReference>, endpoints: &ApiEndpoints) -> Option<String> {
    reference
        .and_then(|reference| reference.resolve(endpoints))
        .map(|target| target.stream_url)
}

fn populated(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Asset paths are relative to the library root; leading slashes carry nothing.
fn populated_path(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(|path| path.trim().trim_start_matches('/'))
        .filter(|path| !path.is_empty())
}
