//! Readiness state for a single playback session

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where a media asset stands on its way to being streamable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    /// No reference yet, or the status check could not be completed
    Unknown,
    /// Status request in flight
    Checking,
    /// Server is preparing the asset; not yet playable
    Transcoding,
    /// Safe to attach to a media element
    Ready,
    /// Transcoding did not finish within the polling budget
    Error,
}

impl ReadinessState {
    /// Check if no further transitions happen without a new reference.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            ReadinessState::Unknown | ReadinessState::Ready | ReadinessState::Error
        )
    }

    /// Check if a status request or poll loop is still running.
    pub fn is_pending(self) -> bool {
        matches!(self, ReadinessState::Checking | ReadinessState::Transcoding)
    }
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessState::Unknown => write!(f, "unknown"),
            ReadinessState::Checking => write!(f, "checking"),
            ReadinessState::Transcoding => write!(f, "transcoding"),
            ReadinessState::Ready => write!(f, "ready"),
            ReadinessState::Error => write!(f, "error"),
        }
    }
}

/// Snapshot published to whoever renders the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub state: ReadinessState,
    /// Human-readable status line, cleared when there is nothing to say
    pub message: Option<String>,
    /// Poll requests made so far in this cycle
    pub attempts: u32,
    /// The status check itself failed; direct playback may still be attempted
    pub check_failed: bool,
}

impl Default for ReadinessStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

impl ReadinessStatus {
    pub fn unknown() -> Self {
        Self {
            state: ReadinessState::Unknown,
            message: None,
            attempts: 0,
            check_failed: false,
        }
    }

    pub fn checking() -> Self {
        Self {
            state: ReadinessState::Checking,
            message: Some("Checking video availability...".to_string()),
            ..Self::unknown()
        }
    }

    /// Status check failed. Message stays cleared; the failure is a hint only.
    pub fn check_failed() -> Self {
        Self {
            check_failed: true,
            ..Self::unknown()
        }
    }

    pub fn transcoding(in_progress: bool, attempts: u32) -> Self {
        let message = if in_progress {
            "Video is being prepared for playback. This may take a few minutes..."
        } else {
            "Video needs to be converted for playback. Starting conversion..."
        };

        Self {
            state: ReadinessState::Transcoding,
            message: Some(message.to_string()),
            attempts,
            check_failed: false,
        }
    }

    pub fn ready(attempts: u32) -> Self {
        Self {
            state: ReadinessState::Ready,
            message: None,
            attempts,
            check_failed: false,
        }
    }

    pub fn timed_out(attempts: u32, budget: Duration) -> Self {
        Self {
            state: ReadinessState::Error,
            message: Some(format!(
                "Video preparation timed out after {}. Please try again later.",
                describe_budget(budget)
            )),
            attempts,
            check_failed: false,
        }
    }

    /// Check if the resolved URL may be handed to a media element.
    ///
    /// `direct_play_fallback` allows playback after a failed status check.
    pub fn allows_playback(&self, direct_play_fallback: bool) -> bool {
        match self.state {
            ReadinessState::Ready => true,
            ReadinessState::Unknown => direct_play_fallback && self.check_failed,
            _ => false,
        }
    }
}

fn describe_budget(budget: Duration) -> String {
    let secs = budget.as_secs();
    match secs {
        0..60 => format!("{secs} seconds"),
        60..120 => "1 minute".to_string(),
        _ => format!("{} minutes", secs / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_and_pending_states() {
        assert!(ReadinessState::Unknown.is_settled());
        assert!(ReadinessState::Ready.is_settled());
        assert!(ReadinessState::Error.is_settled());
        assert!(ReadinessState::Checking.is_pending());
        assert!(ReadinessState::Transcoding.is_pending());
        assert!(!ReadinessState::Transcoding.is_settled());
    }

    #[test]
    fn test_playback_gate() {
        assert!(ReadinessStatus::ready(0).allows_playback(false));
        assert!(!ReadinessStatus::unknown().allows_playback(true));
        assert!(ReadinessStatus::check_failed().allows_playback(true));
        assert!(!ReadinessStatus::check_failed().allows_playback(false));
        assert!(!ReadinessStatus::transcoding(true, 3).allows_playback(true));
        assert!(!ReadinessStatus::checking().allows_playback(true));
        assert!(
            !ReadinessStatus::timed_out(180, Duration::from_secs(360)).allows_playback(true)
        );
    }

    #[test]
    fn test_messages() {
        assert!(
            ReadinessStatus::transcoding(true, 0)
                .message
                .unwrap()
                .contains("being prepared")
        );
        assert!(
            ReadinessStatus::transcoding(false, 0)
                .message
                .unwrap()
                .contains("Starting conversion")
        );
        assert_eq!(ReadinessStatus::check_failed().message, None);
        assert_eq!(
            ReadinessStatus::timed_out(180, Duration::from_secs(360)).message,
            Some("Video preparation timed out after 6 minutes. Please try again later.".into())
        );
        assert_eq!(describe_budget(Duration::from_millis(200)), "0 seconds");
        assert_eq!(describe_budget(Duration::from_secs(90)), "1 minute");
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&ReadinessState::Transcoding).unwrap();
        assert_eq!(json, "\"transcoding\"");
    }
}
