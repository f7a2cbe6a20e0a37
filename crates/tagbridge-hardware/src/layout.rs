//! Memory layouts of storage cards.
//!
//! Sector reads walk fixed-size units (4-byte pages on Ultralight, 16-byte
//! blocks on MIFARE Classic) in ascending order. The UID-bearing area at the
//! start of memory is never read, and on Classic cards the sector trailers
//! holding the access keys are skipped.
//!
//! # Examples
//!
//! ```
//! use tagbridge_core::TagType;
//! use tagbridge_hardware::layout::MemoryLayout;
//!
//! let layout = MemoryLayout::for_tag(TagType::MifareClassic1K).unwrap();
//! let blocks: Vec<u16> = layout.units(layout.default_range()).take(5).collect();
//!
//! // Block 7 is the trailer of sector 1
//! assert_eq!(blocks, vec![4, 5, 6, 8, 9]);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Range;
use tagbridge_core::TagType;

/// First page after the Ultralight UID, lock and capability pages.
pub const ULTRALIGHT_FIRST_PAGE: u16 = 4;

/// First block after MIFARE Classic sector 0 (UID and manufacturer data).
pub const CLASSIC_FIRST_BLOCK: u16 = 4;

/// Blocks below this index belong to 4-block sectors; above it, 4K cards
/// use 16-block sectors.
const CLASSIC_LARGE_SECTOR_START: u16 = 128;

/// Half-open range of pages or blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u16,
    pub end: u16,
}

impl PageRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn as_range(&self) -> Range<u16> {
        self.start..self.end
    }
}

/// Unit addressed by the read command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Page,
    Block,
}

/// Readable memory of a card type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    kind: UnitKind,
    unit_size: usize,
    readable: PageRange,
}

impl MemoryLayout {
    /// Layout for a card type, or `None` for types without a sector layout.
    pub fn for_tag(tag_type: TagType) -> Option<Self> {
        let (kind, unit_size, readable) = match tag_type {
            TagType::MifareUltralight => (
                UnitKind::Page,
                4,
                PageRange::new(ULTRALIGHT_FIRST_PAGE, 16),
            ),
            TagType::MifareMini => (UnitKind::Block, 16, PageRange::new(CLASSIC_FIRST_BLOCK, 20)),
            TagType::MifareClassic1K => {
                (UnitKind::Block, 16, PageRange::new(CLASSIC_FIRST_BLOCK, 64))
            }
            TagType::MifareClassic4K => {
                (UnitKind::Block, 16, PageRange::new(CLASSIC_FIRST_BLOCK, 256))
            }
            _ => return None,
        };
        Some(Self {
            kind,
            unit_size,
            readable,
        })
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Bytes per page or block.
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Every readable unit of the card.
    pub fn default_range(&self) -> PageRange {
        self.readable
    }

    /// Whether `unit` is a sector trailer.
    pub fn is_trailer(&self, unit: u16) -> bool {
        if self.kind != UnitKind::Block {
            return false;
        }
        if unit < CLASSIC_LARGE_SECTOR_START {
            (unit + 1) % 4 == 0
        } else {
            (unit + 1) % 16 == 0
        }
    }

    /// First block of the sector holding `unit`, used as the
    /// authentication target.
    pub fn sector_start(&self, unit: u16) -> u16 {
        match self.kind {
            UnitKind::Page => unit,
            UnitKind::Block if unit < CLASSIC_LARGE_SECTOR_START => unit - unit % 4,
            UnitKind::Block => unit - (unit - CLASSIC_LARGE_SECTOR_START) % 16,
        }
    }

    /// Units of `range` that may be read, clamped to the readable area and
    /// without sector trailers.
    pub fn units(&self, range: PageRange) -> impl Iterator<Item = u16> + '_ {
        let start = range.start.max(self.readable.start);
        let end = range.end.min(self.readable.end);
        (start..end).filter(move |unit| !self.is_trailer(*unit))
    }
}
