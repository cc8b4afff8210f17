//! Core error types for georeminder-core.
//!
//! This module defines the error hierarchy using thiserror. Only positioning
//! failures are ever surfaced to the user; persistence and notification
//! failures are logged and swallowed by the components that hit them.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for georeminder-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Tracking-related errors
    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    /// Persistence-related errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while starting or running location tracking.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    /// The platform offers no position source.
    #[error("Geolocation not supported")]
    UnsupportedPositioning,

    /// The position source reported an error.
    #[error("{0}")]
    Position(#[from] PositionError),

    /// `start()` was called while a subscription is already open.
    #[error("Tracking is already active")]
    AlreadyTracking,

    /// The tracking session task has shut down.
    #[error("Tracking session is closed")]
    SessionClosed,
}

/// Errors reported by a position source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    /// The user (or OS) refused access to the position.
    #[error("User denied Geolocation")]
    PermissionDenied,

    /// The source could not determine a position right now.
    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    /// No fix was produced within the per-fix timeout.
    #[error("Timeout expired: no position within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Any other source-specific failure.
    #[error("{message}")]
    Other { message: String, terminal: bool },
}

impl PositionError {
    /// Terminal errors end the subscription; transient ones leave it open.
    pub fn is_terminal(&self) -> bool {
        match self {
            PositionError::PermissionDenied => true,
            PositionError::PositionUnavailable(_) | PositionError::Timeout { .. } => false,
            PositionError::Other { terminal, .. } => *terminal,
        }
    }
}

/// Reminder persistence errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open the database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored data could not be encoded or decoded
    #[error("Failed to (de)serialize reminders: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to access the data directory
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Errors raised by notification side channels (haptics, system
/// notifications, speech).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    /// The channel is not available on this platform.
    #[error("{channel} is not supported")]
    Unsupported { channel: &'static str },

    /// Notification permission was not granted.
    #[error("Notification permission not granted")]
    PermissionDenied,

    /// The side effect was attempted and failed.
    #[error("{channel} failed: {message}")]
    Failed {
        channel: &'static str,
        message: String,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to access the data directory
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors for user-entered reminder data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Empty required text field
    #[error("'{0}' must not be empty")]
    Empty(String),

    /// Coordinate outside WGS-84 range
    #[error("{field} {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    PersistenceError::Locked
                } else {
                    PersistenceError::QueryFailed(err.to_string())
                }
            }
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_is_terminal() {
        assert!(PositionError::PermissionDenied.is_terminal());
        assert!(!PositionError::Timeout { timeout_ms: 10_000 }.is_terminal());
        assert!(!PositionError::PositionUnavailable("no signal".into()).is_terminal());
    }

    #[test]
    fn other_error_carries_its_own_severity() {
        let revoked = PositionError::Other {
            message: "provider disabled".into(),
            terminal: true,
        };
        assert!(revoked.is_terminal());
        assert_eq!(revoked.to_string(), "provider disabled");
    }

    #[test]
    fn tracking_error_wraps_position_message() {
        let err: TrackingError = PositionError::Timeout { timeout_ms: 10_000 }.into();
        assert_eq!(err.to_string(), "Timeout expired: no position within 10000 ms");
    }
}
