//! Sensor error types

use thiserror::Error;

/// Errors surfaced by sensor operations
///
/// Registry lookups, repeated mounts and detaching elements that were never
/// observed are silent no-ops; only failures reported by the host document
/// reach the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The host document rejected an operation
    #[error("DOM operation failed: {0}")]
    Dom(String),
}

/// Result type for sensor operations
pub type Result<T> = std::result::Result<T, SensorError>;
