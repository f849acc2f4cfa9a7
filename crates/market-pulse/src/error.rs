//! Error types for market-pulse operations

use thiserror::Error;

/// Market pulse specific errors
#[derive(Debug, Error)]
pub enum PulseError {
    /// Market-data call failed, timed out or returned garbage
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Rejected input (malformed alarm time, bad prune target, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A history file could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding or decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chat command could not be parsed
    #[error("Command error: {0}")]
    Command(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PulseError {
    /// Whether the failure came from the market-data provider
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Network(_) | Self::Json(_))
    }

    /// Whether the failure is a user input problem
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_) | Self::Command(_))
    }

    /// Whether the failure came from the history files
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Csv(_) | Self::Io(_))
    }
}

/// Result type alias for market-pulse operations
pub type Result<T> = std::result::Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PulseError::Validation("bad time: 25:00".to_string());
        assert_eq!(err.to_string(), "Validation error: bad time: 25:00");

        let err = PulseError::NotFound("alarm #4".to_string());
        assert_eq!(err.to_string(), "Not found: alarm #4");
    }

    #[test]
    fn test_error_classes() {
        assert!(PulseError::Upstream("timeout".into()).is_upstream());
        assert!(PulseError::Command("empty".into()).is_validation());
        assert!(PulseError::Persistence("locked".into()).is_persistence());
        assert!(!PulseError::Config("x".into()).is_upstream());

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(PulseError::from(io).is_persistence());
    }
}
