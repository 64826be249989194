//! Error types for device access

use thiserror::Error;

/// Errors raised by the registry and dispatcher
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device {0} has no network address")]
    NoAddress(String),

    #[error("Transport {transport:?} not supported for device {id}")]
    UnsupportedTransport {
        id: String,
        transport: crate::device::Transport,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
