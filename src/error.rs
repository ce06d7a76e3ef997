//! Error types and handling for Gridwatch
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Gridwatch operations
pub type Result<T> = std::result::Result<T, GridwatchError>;

/// Main error type for Gridwatch
#[derive(Debug, Error)]
pub enum GridwatchError {
    /// Configuration-related errors (the only fatal class)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream fetch errors: network failure, non-200 status,
    /// malformed body, missing key, out-of-range value
    #[error("Fetch error: {source_name} - {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// History file write/rename failures
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl GridwatchError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        GridwatchError::Config {
            message: message.into(),
        }
    }

    /// Create a new fetch error for a named upstream
    pub fn fetch<S: Into<String>>(source_name: S, message: S) -> Self {
        GridwatchError::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a new persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        GridwatchError::Persistence {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        GridwatchError::Io {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        GridwatchError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        GridwatchError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        GridwatchError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for GridwatchError {
    fn from(err: std::io::Error) -> Self {
        GridwatchError::io(err.to_string())
    }
}

impl From<serde_json::Error> for GridwatchError {
    fn from(err: serde_json::Error) -> Self {
        GridwatchError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for GridwatchError {
    fn from(err: reqwest::Error) -> Self {
        GridwatchError::Fetch {
            source_name: "http".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for GridwatchError {
    fn from(err: chrono::ParseError) -> Self {
        GridwatchError::validation("datetime", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = GridwatchError::config("test config error");
        assert!(matches!(err, GridwatchError::Config { .. }));

        let err = GridwatchError::fetch("outage", "building not found");
        assert!(matches!(err, GridwatchError::Fetch { .. }));

        let err = GridwatchError::validation("field", "test validation error");
        assert!(matches!(err, GridwatchError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = GridwatchError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = GridwatchError::fetch("grid-state", "unexpected status 502");
        assert_eq!(
            format!("{}", err),
            "Fetch error: grid-state - unexpected status 502"
        );
    }
}
