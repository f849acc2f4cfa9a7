//! Environment access helpers

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable, colored output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Read the format from `PULSE_LOG_FORMAT` (`json` or anything else)
    pub fn from_env() -> Self {
        match env_opt("PULSE_LOG_FORMAT").as_deref() {
            Some("json" | "JSON") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Load a `.env` file from the working directory if one exists.
///
/// Returns whether a file was loaded. A missing file is not an error.
pub fn load_dotenv() -> bool {
    dotenvy::dotenv().is_ok()
}

/// Read a non-empty environment variable
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an environment variable, falling back to `default` when it is
/// unset or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_when_unset() {
        let value: u64 = env_or("PULSE_UTILS_TEST_SURELY_UNSET", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_opt_unset_is_none() {
        assert!(env_opt("PULSE_UTILS_TEST_ALSO_UNSET").is_none());
    }

    #[test]
    fn test_log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
