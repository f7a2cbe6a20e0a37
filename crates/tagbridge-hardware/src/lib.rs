//! Reader chip abstraction layer for tagbridge.
//!
//! This crate defines the [`TagReader`] capability trait the polling loop
//! drives, and one implementation per reader family:
//!
//! - [`pn532::Pn532Reader`]: NXP PN532 over its high-speed UART frame
//!   protocol, on any async byte stream. Reads NDEF messages.
//! - `pcsc::PcscReader` (feature `hardware-pcsc`): PC/SC contactless readers
//!   such as the ACR122U. Dumps raw sectors of storage cards.
//! - [`mock::MockTagReader`]: an in-memory field controlled through a handle,
//!   for development and tests.
//!
//! [`devices::AnyTagReader`] dispatches over the families, and is opened
//! from [`devices::ReaderSettings`] at startup.
//!
//! # Design Philosophy
//!
//! - **Async-first**: all chip I/O goes through native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Bounded**: a poll returns within roughly its timeout, whether or not a
//!   card answered.
//! - **No policy**: readers report what the chip sees. Deciding whether a
//!   card is new belongs to the caller.
//! - **Partial over fatal**: a sector read that fails part way returns what
//!   it read, with a [`PartialRead`] marker.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tagbridge_hardware::traits::{PresenceResult, ReadStrategy, TagReader};
//! use tagbridge_hardware::error::Result;
//!
//! async fn read_once<R: TagReader>(reader: &mut R) -> Result<()> {
//!     if let PresenceResult::Present(tag) = reader.poll(Duration::from_millis(5)).await? {
//!         match reader.read_strategy() {
//!             ReadStrategy::Ndef => {
//!                 let message = reader.read_ndef(&tag).await?;
//!                 println!("{}: {} records", tag.uid, message.len());
//!             }
//!             ReadStrategy::Sectors => {
//!                 println!("{}: sector reader", tag.uid);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`TagReader`]: traits::TagReader

pub mod devices;
pub mod error;
pub mod layout;
pub mod mock;
#[cfg(feature = "hardware-pcsc")]
pub mod pcsc;
pub mod pn532;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{AnyTagReader, ReaderSettings};
pub use error::{HardwareError, Result};
pub use layout::{MemoryLayout, PageRange, UnitKind};
pub use tagbridge_ndef::NdefMessage;
pub use traits::{PresenceResult, RawTag, ReadStrategy, TagReader};
pub use types::{PartialRead, ReaderInfo, SectorData};
