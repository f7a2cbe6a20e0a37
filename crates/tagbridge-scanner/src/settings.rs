//! Startup settings of the bridge.
//!
//! Read once from a camelCase JSON file. Every field has a default, so an
//! empty object runs the bridge on a mock reader:
//!
//! ```json
//! {
//!   "reader": { "family": "pn532", "address": "192.168.1.40:4001" },
//!   "pollTimeoutMs": 50,
//!   "tagReadIntervalMs": 200
//! }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tagbridge_core::{
    PollConfig,
    constants::{DEFAULT_POLL_TIMEOUT_MS, DEFAULT_TAG_READ_INTERVAL_MS},
};
use tagbridge_hardware::{PageRange, ReaderSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    pub reader: ReaderSettings,

    /// Bound on each presence poll.
    pub poll_timeout_ms: u64,

    /// Initial poll cadence; remote pushes may change it later.
    pub tag_read_interval_ms: u64,

    /// Pages or blocks dumped by sector readers. Defaults to the whole
    /// readable area of the card type.
    pub sector_range: Option<PageRange>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            reader: ReaderSettings::default(),
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            tag_read_interval_ms: DEFAULT_TAG_READ_INTERVAL_MS,
            sector_range: None,
        }
    }
}

impl BridgeSettings {
    /// Parse and validate settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the read interval is
    /// outside its schema bounds.
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.poll_config()?;
        Ok(settings)
    }

    /// Load settings from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Initial poll configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfigValue` if the interval is out of range.
    pub fn poll_config(&self) -> Result<PollConfig> {
        Ok(PollConfig::with_interval_ms(self.tag_read_interval_ms)?)
    }
}
