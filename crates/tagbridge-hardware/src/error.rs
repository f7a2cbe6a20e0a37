//! Error types for reader operations.
//!
//! This module defines error types specific to reader chip operations,
//! covering disconnection, timeouts, protocol faults and card types a
//! reader cannot handle.

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during reader operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Reader link is closed or was never opened.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Operation is not supported by this reader or card type.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The chip did not complete an exchange.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from the chip.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Reader initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Reader configuration error.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Card reading error (authentication refused, unexpected status).
    #[error("Card read error: {message}")]
    CardReadError { message: String },

    #[error(transparent)]
    Core(#[from] tagbridge_core::Error),

    /// PC/SC service error.
    #[cfg(feature = "hardware-pcsc")]
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new card read error.
    pub fn card_read(message: impl Into<String>) -> Self {
        Self::CardReadError {
            message: message.into(),
        }
    }

    /// Whether the card type or operation is outside what the reader can do.
    ///
    /// Callers publish such tags without content instead of retrying.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("PN532");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: PN532");
    }

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(250);
        assert!(matches!(error, HardwareError::Timeout { .. }));
        assert_eq!(error.to_string(), "Operation timeout after 250ms");
    }

    #[test]
    fn test_unsupported_error() {
        let error = HardwareError::unsupported("read_ndef on ISO_14443_4");
        assert!(error.is_unsupported());
        assert_eq!(
            error.to_string(),
            "Unsupported operation: read_ndef on ISO_14443_4"
        );
    }

    #[test]
    fn test_communication_error() {
        let error = HardwareError::communication("short READ reply");
        assert!(!error.is_unsupported());
        assert_eq!(error.to_string(), "Communication error: short READ reply");
    }

    #[test]
    fn test_core_error_conversion() {
        let core = tagbridge_core::Uid::new(&[]).unwrap_err();
        let error: HardwareError = core.into();
        assert!(matches!(error, HardwareError::Core(_)));
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            HardwareError::invalid_data("bad frame"),
            HardwareError::initialization_failed("no firmware reply"),
            HardwareError::configuration("missing address"),
            HardwareError::card_read("auth refused"),
        ];

        for error in errors {
            let _ = format!("{}", error);
            let _ = format!("{:?}", error);
        }
    }
}
