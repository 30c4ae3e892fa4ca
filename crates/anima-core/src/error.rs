//! Core error types for anima-core.
//!
//! Errors are split by how they must be handled:
//!
//! - [`StoreError`] is fatal. A settings store that cannot be opened or read
//!   would silently break the PIN/lockout guarantee, so it always propagates.
//! - [`HostError`] is recoverable. Scheduling and notification failures are
//!   caught inside the scheduler and dispatcher, logged, and never returned to
//!   the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for anima-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Settings store errors
    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Calendar arithmetic errors
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Settings store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The encryption key provider could not be initialized. The store
    /// refuses to operate rather than fall back to plaintext.
    #[error("Settings store unavailable: {0}")]
    Unavailable(String),

    /// Failed to open the backing database
    #[error("Failed to open settings store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Stored ciphertext could not be authenticated or decoded
    #[error("Failed to decrypt value for '{key}'")]
    Decrypt { key: String },

    /// A stored value does not parse as the type its key requires
    #[error("Corrupt value for '{key}': {value}")]
    Corrupt { key: String, value: String },

    /// Database is locked
    #[error("Settings store is locked")]
    Locked,
}

/// Failures reported by the host timer and notification facilities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host refused to register a wake-up (e.g. power-management policy).
    #[error("Scheduling denied: {0}")]
    SchedulingDenied(String),

    /// Runtime notification permission is missing.
    #[error("Notification permission absent")]
    PermissionAbsent,

    /// Any other host-side failure.
    #[error("Host backend error: {0}")]
    Backend(String),
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// PIN must not be empty or whitespace
    #[error("PIN must not be blank")]
    BlankPin,

    /// PIN and its confirmation differ
    #[error("PIN and confirmation do not match")]
    PinMismatch,
}

/// Calendar arithmetic errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// Hour or minute outside the wall-clock range
    #[error("Invalid wall-clock time {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    /// Year/month pair does not name a calendar month
    #[error("Invalid month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    /// No local instant could be resolved for the requested wall-clock time
    #[error("Could not resolve local time {0}")]
    Unresolvable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::Query(err.to_string())
                }
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_database_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(StoreError::from(err), StoreError::Locked));
    }

    #[test]
    fn store_error_wraps_into_core_error() {
        let err: CoreError = StoreError::Unavailable("no keyring".into()).into();
        assert_eq!(
            err.to_string(),
            "Settings store error: Settings store unavailable: no keyring"
        );
    }
}
