//! URL construction for the backend video endpoints

use url::Url;

const STREAM_PREFIX: &str = "/api/videos/stream/";
const STATUS_PREFIX: &str = "/api/videos/transcode-status/";

/// Builds backend video URLs from a base API URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base: String,
    base_url: Url,
}

impl ApiEndpoints {
    /// Creates endpoints rooted at `base_url`. A trailing slash is ignored.
    pub fn new(base_url: &Url) -> Self {
        Self {
            base: base_url.as_str().trim_end_matches('/').to_string(),
            base_url: base_url.clone(),
        }
    }

    /// Base URL without trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// `GET {base}/api/videos/stream/{asset}`
    pub fn stream_url(&self, asset: &str) -> String {
        format!("{}{STREAM_PREFIX}{}", self.base, encode_asset_path(asset))
    }

    /// `GET {base}/api/videos/transcode-status/{asset}`
    pub fn transcode_status_url(&self, asset: &str) -> String {
        format!("{}{STATUS_PREFIX}{}", self.base, encode_asset_path(asset))
    }

    /// Extracts the asset key from a stream URL served by this backend.
    ///
    /// Root-relative URLs resolve against the base origin. URLs on any other
    /// origin, or outside the base path, are not backend streams.
    pub fn asset_from_stream_url(&self, url: &str) -> Option<String> {
        let parsed = self.base_url.join(url).ok()?;
        if parsed.origin() != self.base_url.origin() {
            return None;
        }

        let prefix = format!(
            "{}{STREAM_PREFIX}",
            self.base_url.path().trim_end_matches('/')
        );
        let encoded = parsed.path().strip_prefix(prefix.as_str())?;
        if encoded.is_empty() {
            return None;
        }

        let decoded = urlencoding::decode(encoded).ok()?;
        Some(decoded.into_owned())
    }
}

/// Percent-encodes each path segment, keeping `/` separators.
pub(crate) fn encode_asset_path(asset: &str) -> String {
    asset
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(base: &str) -> ApiEndpoints {
        ApiEndpoints::new(&Url::parse(base).unwrap())
    }

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let api = endpoints("http://localhost:8000/");
        assert_eq!(
            api.stream_url("a.mp4"),
            "http://localhost:8000/api/videos/stream/a.mp4"
        );
        assert_eq!(
            api.transcode_status_url("a.mp4"),
            "http://localhost:8000/api/videos/transcode-status/a.mp4"
        );
    }

    #[test]
    fn test_asset_paths_are_encoded_per_segment() {
        let api = endpoints("https://api.kinetic.test/v1");
        assert_eq!(
            api.stream_url("/legs/Bulgarian split squat.mov"),
            "https://api.kinetic.test/v1/api/videos/stream/legs/Bulgarian%20split%20squat.mov"
        );
        assert_eq!(encode_asset_path("a?b#c.mp4"), "a%3Fb%23c.mp4");
    }

    #[test]
    fn test_asset_from_stream_url() {
        let api = endpoints("http://localhost:8000");
        assert_eq!(
            api.asset_from_stream_url(
                "http://localhost:8000/api/videos/stream/legs/split%20squat.mov?t=10"
            ),
            Some("legs/split squat.mov".to_string())
        );
        assert_eq!(
            api.asset_from_stream_url("/api/videos/stream/42#start"),
            Some("42".to_string())
        );
        assert_eq!(api.asset_from_stream_url("https://cdn.example.com/clip.mp4"), None);
        assert_eq!(
            api.asset_from_stream_url("http://localhost:8000/api/videos/stream/"),
            None
        );
    }

    #[test]
    fn test_stream_url_on_other_origin_has_no_asset() {
        let api = endpoints("http://localhost:8000");
        assert_eq!(
            api.asset_from_stream_url("https://mirror.example.com/api/videos/stream/a.mkv"),
            None
        );
        assert_eq!(
            api.asset_from_stream_url("http://localhost:9000/api/videos/stream/a.mkv"),
            None
        );

        let prefixed = endpoints("https://api.kinetic.test/v1/");
        assert_eq!(
            prefixed.asset_from_stream_url("https://api.kinetic.test/v1/api/videos/stream/a.mkv"),
            Some("a.mkv".to_string())
        );
        assert_eq!(
            prefixed.asset_from_stream_url("https://api.kinetic.test/api/videos/stream/a.mkv"),
            None
        );
    }
}
