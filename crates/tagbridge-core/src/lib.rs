//! Core types shared by every tagbridge crate.
//!
//! This crate holds the pieces with no hardware or runtime dependencies:
//! byte rendering ([`codec`]), card identity types ([`types`]), the poll
//! configuration store and its schema descriptor ([`config`]), and the
//! common error type.

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{CONFIG_SCHEMA, ConfigChange, ConfigSchema, IntegerField, PollConfig};
pub use error::{Error, Result};
pub use types::{TagType, Uid};

/// Firmware name reported at startup.
pub const FIRMWARE_NAME: &str = "tagbridge";

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
