//! Runtime mode selection

use std::fmt;
use std::str::FromStr;

/// Whether a missing backend URL is an error.
///
/// Production requires `KINETIC_API_URL`; development falls back to a local
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Production,
    Development,
}

impl RuntimeMode {
    /// Release builds run in production mode.
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Development => "development",
        })
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!(
                "unknown runtime mode '{other}' (expected production or development)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_mode_parsing() {
        assert_eq!("prod".parse::<RuntimeMode>(), Ok(RuntimeMode::Production));
        assert_eq!(
            " Development ".parse::<RuntimeMode>(),
            Ok(RuntimeMode::Development)
        );
        assert!("staging".parse::<RuntimeMode>().is_err());
    }

    #[test]
    fn test_display_matches_accepted_input() {
        for mode in [RuntimeMode::Production, RuntimeMode::Development] {
            assert_eq!(mode.to_string().parse::<RuntimeMode>(), Ok(mode));
        }
        assert!(RuntimeMode::Production.is_production());
        assert!(!RuntimeMode::Development.is_production());
    }
}
