//! Tag acquisition loop for tagbridge.
//!
//! Turns the raw presence results of a [`TagReader`] into one published
//! event per card presentation:
//!
//! 1. [`poller::BridgeContext`] polls the reader on a configurable cadence.
//! 2. [`debounce::TagDebouncer`] suppresses cards that stay in the field.
//! 3. New cards are read with the reader's strategy (NDEF or raw sectors).
//! 4. [`event::encode`] renders the result as a [`event::TagEvent`].
//! 5. A [`transport::Transport`] carries the event off the device.
//!
//! Runtime configuration pushes go through
//! [`poller::BridgeContext::on_config_change`] and are validated against
//! [`tagbridge_core::CONFIG_SCHEMA`].
//!
//! [`TagReader`]: tagbridge_hardware::TagReader

pub mod debounce;
pub mod error;
pub mod event;
pub mod poller;
pub mod settings;
pub mod transport;

pub use debounce::{DebounceStats, TagDebouncer, Transition};
pub use error::{Result, ScannerError};
pub use event::{EventBody, RecordView, TagContents, TagEvent};
pub use poller::{BridgeContext, BridgeContextBuilder, BridgeStats, TickOutcome};
pub use settings::BridgeSettings;
pub use transport::{ChannelTransport, Transport};
