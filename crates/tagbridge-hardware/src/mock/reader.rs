//! Mock tag reader implementation for testing and development.
//!
//! This module provides a simulated reader whose field is controlled
//! programmatically through a handle, so the polling loop can be exercised
//! without physical hardware.

use crate::{
    HardwareError, Result,
    layout::{MemoryLayout, PageRange},
    traits::{PresenceResult, RawTag, ReadStrategy, TagReader},
    types::{ReaderInfo, SectorData},
};
use std::sync::Arc;
use tagbridge_core::{TagType, Uid};
use tagbridge_ndef::{NdefMessage, tlv};
use tokio::sync::Mutex;
use tracing::warn;

/// A simulated card.
#[derive(Debug, Clone)]
pub struct MockTag {
    pub uid: Uid,
    pub atqa: u16,
    pub sak: u8,
    ndef_area: Vec<u8>,
    memory: Vec<u8>,
    fail_at_unit: Option<u16>,
}

impl MockTag {
    /// Create a blank card. Memory is zero filled up to the end of the
    /// card type's layout.
    pub fn new(uid: Uid, sak: u8) -> Self {
        let tag_type = TagType::from_sak(sak);
        let atqa = if tag_type == TagType::MifareUltralight {
            0x0044
        } else {
            0x0004
        };
        let memory_len = MemoryLayout::for_tag(tag_type)
            .map(|layout| usize::from(layout.default_range().end) * layout.unit_size())
            .unwrap_or(0);

        Self {
            uid,
            atqa,
            sak,
            ndef_area: Vec::new(),
            memory: vec![0; memory_len],
            fail_at_unit: None,
        }
    }

    /// Store an NDEF message on the card.
    pub fn with_ndef(mut self, message: &NdefMessage) -> Self {
        self.ndef_area = tlv::wrap_message(&message.to_bytes());
        self
    }

    /// Store a raw TLV area on the card (for malformed content).
    pub fn with_ndef_area(mut self, area: Vec<u8>) -> Self {
        self.ndef_area = area;
        self
    }

    /// Replace the memory image, indexed from page/block 0.
    pub fn with_memory(mut self, memory: Vec<u8>) -> Self {
        self.memory = memory;
        self
    }

    /// Make sector reads fail when they reach `unit`.
    pub fn fail_sector_read_at(mut self, unit: u16) -> Self {
        self.fail_at_unit = Some(unit);
        self
    }

    pub fn tag_type(&self) -> TagType {
        TagType::from_sak(self.sak)
    }
}

#[derive(Debug, Default)]
struct MockField {
    tag: Option<MockTag>,
    poll_failures: u32,
    ndef_failures: u32,
    polls: u64,
}

/// Mock tag reader for testing and development.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tagbridge_core::Uid;
/// use tagbridge_hardware::mock::{MockTag, MockTagReader};
/// use tagbridge_hardware::traits::{PresenceResult, TagReader};
///
/// #[tokio::main]
/// async fn main() -> tagbridge_hardware::Result<()> {
///     let (mut reader, handle) = MockTagReader::new();
///
///     let uid = Uid::new(&[0x04, 0xAB, 0x3C, 0x9F])?;
///     handle.present(MockTag::new(uid, 0x00)).await;
///
///     let result = reader.poll(Duration::from_millis(5)).await?;
///     assert_eq!(result.tag().unwrap().uid.to_hex(), "04AB3C9F");
///
///     handle.remove().await;
///     assert_eq!(reader.poll(Duration::from_millis(5)).await?, PresenceResult::Absent);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTagReader {
    field: Arc<Mutex<MockField>>,
    name: String,
    strategy: ReadStrategy,
}

impl MockTagReader {
    /// Create a new mock reader with the default name.
    pub fn new() -> (Self, MockTagReaderHandle) {
        Self::with_name("Mock Tag Reader".to_string())
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: String) -> (Self, MockTagReaderHandle) {
        let field = Arc::new(Mutex::new(MockField::default()));

        let reader = Self {
            field: Arc::clone(&field),
            name,
            strategy: ReadStrategy::Ndef,
        };

        (reader, MockTagReaderHandle { field })
    }

    /// Switch the content strategy.
    pub fn with_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl TagReader for MockTagReader {
    async fn poll(&mut self, _timeout: std::time::Duration) -> Result<PresenceResult> {
        let mut field = self.field.lock().await;
        field.polls += 1;

        if field.poll_failures > 0 {
            field.poll_failures -= 1;
            return Err(HardwareError::communication("injected poll failure"));
        }

        Ok(match &field.tag {
            Some(tag) => PresenceResult::Present(RawTag::new(tag.uid.clone(), tag.atqa, tag.sak)),
            None => PresenceResult::Absent,
        })
    }

    async fn read_ndef(&mut self, tag: &RawTag) -> Result<NdefMessage> {
        let mut field = self.field.lock().await;

        if field.ndef_failures > 0 {
            field.ndef_failures -= 1;
            return Err(HardwareError::communication("injected NDEF read failure"));
        }

        let card = field
            .tag
            .as_ref()
            .filter(|card| card.uid == tag.uid)
            .ok_or_else(|| HardwareError::communication("tag left the field"))?;

        match tag.tag_type {
            TagType::MifareUltralight
            | TagType::MifareMini
            | TagType::MifareClassic1K
            | TagType::MifareClassic4K => Ok(tlv::decode_area(&card.ndef_area)),
            other => Err(HardwareError::unsupported(format!("read_ndef on {other}"))),
        }
    }

    async fn read_sectors(&mut self, tag: &RawTag, range: PageRange) -> Result<SectorData> {
        let layout = MemoryLayout::for_tag(tag.tag_type).ok_or_else(|| {
            HardwareError::unsupported(format!("read_sectors on {}", tag.tag_type))
        })?;

        let field = self.field.lock().await;
        let mut data = SectorData::new();
        let Some(card) = field.tag.as_ref().filter(|card| card.uid == tag.uid) else {
            data.mark_partial(range.start, "tag left the field");
            return Ok(data);
        };

        let size = layout.unit_size();
        for unit in layout.units(range) {
            let start = usize::from(unit) * size;
            let bytes = card.memory.get(start..start + size);

            match bytes {
                Some(bytes) if card.fail_at_unit != Some(unit) => data.push_unit(bytes),
                _ => {
                    warn!(unit, uid = %tag.uid, "sector read aborted");
                    data.mark_partial(unit, "read failed");
                    break;
                }
            }
        }

        Ok(data)
    }

    fn read_strategy(&self) -> ReadStrategy {
        self.strategy
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        Ok(
            ReaderInfo::new(self.name.clone(), vec!["ISO14443A".to_string()])
                .with_max_baud_rate(424_000),
        )
    }
}

/// Handle for controlling a mock reader's field.
#[derive(Debug, Clone)]
pub struct MockTagReaderHandle {
    field: Arc<Mutex<MockField>>,
}

impl MockTagReaderHandle {
    /// Place a card in the field, replacing any card already there.
    pub async fn present(&self, tag: MockTag) {
        self.field.lock().await.tag = Some(tag);
    }

    /// Take the card out of the field.
    pub async fn remove(&self) {
        self.field.lock().await.tag = None;
    }

    /// Make the next `count` polls fail with a communication error.
    pub async fn fail_next_polls(&self, count: u32) {
        self.field.lock().await.poll_failures = count;
    }

    /// Make the next `count` NDEF reads fail with a communication error.
    pub async fn fail_next_ndef_reads(&self, count: u32) {
        self.field.lock().await.ndef_failures = count;
    }

    /// Number of polls performed so far.
    pub async fn poll_count(&self) -> u64 {
        self.field.lock().await.polls
    }
}
