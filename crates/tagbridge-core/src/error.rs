use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Identity errors
    #[error("Invalid UID: {0}")]
    InvalidUid(String),

    #[error("Invalid hex string at position {position}: {message}")]
    InvalidHex { position: usize, message: String },

    // Configuration errors
    #[error("Invalid value for {key}: {value} (expected {minimum}..={maximum})")]
    InvalidConfigValue {
        key: String,
        value: String,
        minimum: i64,
        maximum: i64,
    },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
