//! Error types for the automation engine

use thiserror::Error;

/// Errors that can occur in the automation engine
#[derive(Error, Debug)]
pub enum AutomationError {
    /// Automation not found
    #[error("Automation not found: {0}")]
    NotFound(String),

    /// Automation is disabled
    #[error("Automation is disabled: {0}")]
    Disabled(String),

    /// Automation with this ID already exists
    #[error("Automation already exists: {0}")]
    Duplicate(String),

    /// Invalid trigger configuration
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// Invalid color value
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Non-numeric or out-of-range brightness
    #[error("Invalid brightness: {0}")]
    InvalidBrightness(String),

    /// Device not found for action
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// IO error (persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
