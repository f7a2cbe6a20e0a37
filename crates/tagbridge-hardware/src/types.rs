//! Common types shared across reader implementations.

use serde::{Deserialize, Serialize};

/// Reader information.
///
/// Contains reader-specific metadata such as supported protocols
/// and the chip firmware version when the reader reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "PN532", "ACS ACR122U PICC Interface").
    pub name: String,

    /// List of supported protocols (e.g., ["ISO14443A"]).
    pub protocols: Vec<String>,

    /// Maximum supported baud rate in bits per second.
    pub max_baud_rate: Option<u32>,

    /// Chip firmware version, e.g. "1.6".
    pub firmware_version: Option<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            protocols,
            max_baud_rate: None,
            firmware_version: None,
        }
    }

    /// Set the maximum baud rate.
    pub fn with_max_baud_rate(mut self, max_baud_rate: u32) -> Self {
        self.max_baud_rate = Some(max_baud_rate);
        self
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// Where a sector read stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRead {
    /// Page or block whose read failed.
    pub failed_unit: u16,
    pub reason: String,
}

/// Raw memory read from a card, in ascending page/block order.
///
/// Only fully read units are included. When a read fails part way, the
/// bytes read so far are kept and [`SectorData::partial`] says where the
/// read stopped; nothing is zero filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectorData {
    bytes: Vec<u8>,
    units_read: usize,
    partial: Option<PartialRead>,
}

impl SectorData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fully read unit.
    pub fn push_unit(&mut self, unit: &[u8]) {
        self.bytes.extend_from_slice(unit);
        self.units_read += 1;
    }

    /// Record that reading stopped at `failed_unit`.
    pub fn mark_partial(&mut self, failed_unit: u16, reason: impl Into<String>) {
        self.partial = Some(PartialRead {
            failed_unit,
            reason: reason.into(),
        });
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn units_read(&self) -> usize {
        self.units_read
    }

    pub fn partial(&self) -> Option<&PartialRead> {
        self.partial.as_ref()
    }

    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_info_builder() {
        let info = ReaderInfo::new("PN532", vec!["ISO14443A".to_string()])
            .with_max_baud_rate(424_000)
            .with_firmware_version("1.6");

        assert_eq!(info.name, "PN532");
        assert_eq!(info.max_baud_rate, Some(424_000));
        assert_eq!(info.firmware_version.as_deref(), Some("1.6"));
    }

    #[test]
    fn test_reader_info_serialization() {
        let info = ReaderInfo::new("Mock Tag Reader", vec!["ISO14443A".to_string()]);
        let json = serde_json::to_string(&info).unwrap();
        let back: ReaderInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_sector_data_partial() {
        let mut data = SectorData::new();
        data.push_unit(&[0x01; 16]);
        data.push_unit(&[0x02; 16]);
        data.mark_partial(6, "auth refused");

        assert_eq!(data.units_read(), 2);
        assert_eq!(data.bytes().len(), 32);
        assert_eq!(data.partial().unwrap().failed_unit, 6);
    }
}
