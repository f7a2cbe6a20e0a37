//! Error types for the polling bridge.

use tagbridge_hardware::HardwareError;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, ScannerError>;

/// Errors that can occur while running the bridge.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// Reader failure.
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Rejected configuration value or malformed settings.
    #[error(transparent)]
    Config(#[from] tagbridge_core::Error),

    /// The transport could not deliver a message.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Settings file could not be parsed.
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScannerError {
    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
