//! Centralized configuration for the Kinetic client.
//!
//! All tunable parameters live here instead of being scattered as literals
//! through the readiness and playback code.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::mode::RuntimeMode;

/// Backend URL used when no override is given in development mode.
pub const DEFAULT_DEV_API_URL: &str = "http://localhost:8000";

/// Environment variable holding the backend base URL.
pub const API_URL_ENV: &str = "KINETIC_API_URL";

/// Errors raised while assembling configuration.
///
/// These are fatal at startup and must be reported, never swallowed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("KINETIC_API_URL must be set in {mode} mode")]
    MissingApiUrl { mode: RuntimeMode },

    #[error("Invalid API base URL '{value}': {reason}")]
    InvalidApiUrl { value: String, reason: String },
}

/// Central configuration for all Kinetic components.
#[derive(Debug, Clone)]
pub struct KineticConfig {
    pub mode: RuntimeMode,
    pub api: ApiConfig,
    pub readiness: ReadinessConfig,
}

/// Backend API connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `https://api.example.com`
    pub base_url: Url,
    /// Timeout for a single status request
    pub request_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_dev_url(),
            request_timeout: Duration::from_secs(10),
            user_agent: "kinetic/0.1.0",
        }
    }
}

/// Transcoding readiness polling settings.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Delay between status polls while the backend transcodes
    pub poll_interval: Duration,
    /// Poll requests made before giving up with a timeout
    pub max_poll_attempts: u32,
    /// Attempt direct playback when the initial status check fails
    pub direct_play_on_check_failure: bool,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 180, // ~6 minutes at 2s
            direct_play_on_check_failure: true,
        }
    }
}

impl ReadinessConfig {
    /// Upper bound on how long polling can run before timing out.
    pub fn polling_budget(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }
}

impl Default for KineticConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Development,
            api: ApiConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl KineticConfig {
    /// Creates configuration from the process environment.
    ///
    /// # Errors
    /// - `ConfigError::MissingApiUrl` - Production mode without `KINETIC_API_URL`
    /// - `ConfigError::InvalidApiUrl` - `KINETIC_API_URL` is not a valid http(s) URL
    pub fn from_env(mode: RuntimeMode) -> Result<Self, ConfigError> {
        Self::from_lookup(mode, |key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source.
    ///
    /// Numeric overrides that fail to parse are ignored and keep their
    /// defaults; only the base URL is strictly validated.
    ///
    /// # Errors
    /// - `ConfigError::MissingApiUrl` - Production mode without a base URL
    /// - `ConfigError::InvalidApiUrl` - Base URL is malformed or not http(s)
    pub fn from_lookup<F>(mode: RuntimeMode, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            mode,
            ..Self::default()
        };

        let raw_url = lookup(API_URL_ENV).filter(|value| !value.trim().is_empty());
        config.api.base_url = match raw_url {
            Some(value) => parse_base_url(value.trim())?,
            None if mode.is_production() => return Err(ConfigError::MissingApiUrl { mode }),
            None => default_dev_url(),
        };

        if let Some(interval) = lookup("KINETIC_POLL_INTERVAL_MS")
            && let Ok(millis) = interval.parse::<u64>()
            && millis > 0
        {
            config.readiness.poll_interval = Duration::from_millis(millis);
        }

        if let Some(attempts) = lookup("KINETIC_MAX_POLL_ATTEMPTS")
            && let Ok(count) = attempts.parse::<u32>()
            && count > 0
        {
            config.readiness.max_poll_attempts = count;
        }

        if let Some(fallback) = lookup("KINETIC_DIRECT_PLAY_FALLBACK") {
            config.readiness.direct_play_on_check_failure = fallback.parse().unwrap_or(true);
        }

        Ok(config)
    }

    /// Creates a configuration with fast polling for tests.
    pub fn for_testing() -> Self {
        Self {
            readiness: ReadinessConfig {
                poll_interval: Duration::from_millis(20),
                max_poll_attempts: 10,
                direct_play_on_check_failure: true,
            },
            ..Self::default()
        }
    }

    /// Overrides the base URL, e.g. to point at a local mock backend.
    ///
    /// # Errors
    /// - `ConfigError::InvalidApiUrl` - URL is malformed or not http(s)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.api.base_url = parse_base_url(base_url)?;
        Ok(self)
    }
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidApiUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidApiUrl {
            value: value.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(url)
}

fn default_dev_url() -> Url {
    Url::parse(DEFAULT_DEV_API_URL).unwrap_or_else(|_| unreachable!("default URL is valid"))
}
