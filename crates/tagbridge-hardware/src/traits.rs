//! Tag reader trait definitions.
//!
//! [`TagReader`] is the capability interface between the polling loop and a
//! reader chip. It reports what the chip currently sees and reads card
//! content on request. It never decides whether a card is new; duplicate
//! suppression belongs to the caller.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::layout::PageRange;
use crate::types::{ReaderInfo, SectorData};
use std::time::Duration;
use tagbridge_core::{TagType, Uid};
use tagbridge_ndef::NdefMessage;

/// A card seen by the reader during one poll.
///
/// Carries the identification returned by anti-collision plus the
/// chip-specific target handle needed for follow-up reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    pub uid: Uid,

    /// ATQA (SENS_RES) as reported by the chip.
    pub atqa: u16,

    /// SAK (SEL_RES) as reported or synthesized by the reader.
    pub sak: u8,

    pub tag_type: TagType,

    /// Logical target number assigned by the chip.
    pub target: u8,

    /// Timestamp when the card was detected.
    pub detected_at: chrono::DateTime<chrono::Utc>,
}

impl RawTag {
    /// Create a tag classified from its SAK, detected now.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagbridge_core::{TagType, Uid};
    /// use tagbridge_hardware::traits::RawTag;
    ///
    /// let uid = Uid::new(&[0x04, 0xAB, 0x3C, 0x9F]).unwrap();
    /// let tag = RawTag::new(uid, 0x0044, 0x00);
    /// assert_eq!(tag.tag_type, TagType::MifareUltralight);
    /// ```
    pub fn new(uid: Uid, atqa: u16, sak: u8) -> Self {
        Self {
            uid,
            atqa,
            sak,
            tag_type: TagType::from_sak(sak),
            target: 1,
            detected_at: chrono::Utc::now(),
        }
    }

    /// Override the classification for readers that do not expose a SAK.
    pub fn with_tag_type(mut self, tag_type: TagType) -> Self {
        self.tag_type = tag_type;
        self
    }

    pub fn with_target(mut self, target: u8) -> Self {
        self.target = target;
        self
    }

    /// Set a custom detection timestamp.
    pub fn with_timestamp(mut self, detected_at: chrono::DateTime<chrono::Utc>) -> Self {
        self.detected_at = detected_at;
        self
    }
}

/// Outcome of a presence poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceResult {
    /// No card answered within the poll timeout.
    Absent,

    Present(RawTag),
}

impl PresenceResult {
    pub fn tag(&self) -> Option<&RawTag> {
        match self {
            Self::Absent => None,
            Self::Present(tag) => Some(tag),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// How content is read from cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Decode the NDEF message.
    Ndef,

    /// Dump raw pages/blocks.
    Sectors,
}

/// Contactless tag reader abstraction.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or the enum wrapper
/// [`AnyTagReader`](crate::devices::AnyTagReader) when the reader family is
/// chosen at runtime:
///
/// ```no_run
/// use std::time::Duration;
/// use tagbridge_hardware::traits::{PresenceResult, TagReader};
/// use tagbridge_hardware::error::Result;
///
/// async fn wait_for_tag<R: TagReader>(reader: &mut R) -> Result<String> {
///     loop {
///         if let PresenceResult::Present(tag) = reader.poll(Duration::from_millis(5)).await? {
///             return Ok(tag.uid.to_hex());
///         }
///     }
/// }
/// ```
pub trait TagReader: Send + Sync {
    /// Report the card currently in the field.
    ///
    /// Returns within roughly `timeout`. A chip that answers with a malformed
    /// or short reply yields an error, never [`PresenceResult::Absent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the chip exchange fails.
    async fn poll(&mut self, timeout: Duration) -> Result<PresenceResult>;

    /// Read and decode the NDEF message of a polled tag.
    ///
    /// A tag without an NDEF message yields an empty message.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Unsupported`](crate::HardwareError::Unsupported)
    /// for card types the reader cannot read, and a communication error if
    /// the read fails.
    async fn read_ndef(&mut self, tag: &RawTag) -> Result<NdefMessage>;

    /// Read raw memory of a polled tag.
    ///
    /// A failure part way through is not an error: the units read so far are
    /// returned with a partial marker. The reader may leave the card halted
    /// afterwards so it does not re-trigger while still in the field.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Unsupported`](crate::HardwareError::Unsupported)
    /// for card types without a memory layout.
    async fn read_sectors(&mut self, tag: &RawTag, range: PageRange) -> Result<SectorData>;

    /// Content strategy of this reader.
    fn read_strategy(&self) -> ReadStrategy;

    /// Get reader information.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be queried.
    async fn get_reader_info(&self) -> Result<ReaderInfo>;
}
