use crate::{
    Result,
    codec,
    constants::{MAX_UID_BYTES, MIN_UID_BYTES},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card identifier reported during anti-collision.
///
/// A UID is stable for as long as the card stays powered in the reader's
/// field. It is not globally unique across card standards, but it is what
/// the debounce logic compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(Vec<u8>);

impl Uid {
    /// Create a UID with length validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` if the length is outside
    /// `MIN_UID_BYTES..=MAX_UID_BYTES`.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        let len = bytes.len();
        if !(MIN_UID_BYTES..=MAX_UID_BYTES).contains(&len) {
            return Err(Error::InvalidUid(format!(
                "UID length must be {MIN_UID_BYTES}-{MAX_UID_BYTES} bytes, got {len}"
            )));
        }
        Ok(Uid(bytes.to_vec()))
    }

    /// Parse a UID from its hex rendering.
    ///
    /// # Errors
    /// Returns an error if the text is not valid hex or has an invalid length.
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = codec::decode_hex(text)?;
        Uid::new(&bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Uppercase hex rendering, e.g. `04AB3C9F`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for Uid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Uid::from_hex(&value)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.to_hex()
    }
}

impl std::str::FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uid::from_hex(s.trim())
    }
}

/// Physical card classification.
///
/// Derived from the SAK byte returned during anti-collision. Readers that do
/// not expose the SAK (PC/SC) build the type from their own metadata and use
/// [`TagType::nominal_sak`] when a SAK has to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TagType {
    /// MIFARE Classic Mini (320 bytes).
    MifareMini,

    /// MIFARE Classic 1K.
    MifareClassic1K,

    /// MIFARE Classic 4K.
    MifareClassic4K,

    /// MIFARE Ultralight and NTAG (NFC Forum Type 2).
    MifareUltralight,

    /// MIFARE Plus.
    MifarePlus,

    /// MIFARE TNP3XXX.
    Tnp3xxx,

    /// ISO 14443-4 compliant card (DESFire, Type 4 tags).
    Iso14443_4,

    /// ISO 18092 (NFC-DEP) target.
    Iso18092,

    /// UID not complete, SAK announced a further cascade level.
    NotComplete,

    /// Unrecognized SAK.
    Unknown(u8),
}

impl TagType {
    /// Classify a card from its SAK byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagbridge_core::TagType;
    ///
    /// assert_eq!(TagType::from_sak(0x08), TagType::MifareClassic1K);
    /// assert_eq!(TagType::from_sak(0x00), TagType::MifareUltralight);
    /// assert_eq!(TagType::from_sak(0x53), TagType::Unknown(0x53));
    /// ```
    pub fn from_sak(sak: u8) -> Self {
        // Bit 8 has no meaning for the classification.
        match sak & 0x7F {
            0x04 => Self::NotComplete,
            0x09 => Self::MifareMini,
            0x08 => Self::MifareClassic1K,
            0x18 => Self::MifareClassic4K,
            0x00 => Self::MifareUltralight,
            0x10 | 0x11 => Self::MifarePlus,
            0x01 => Self::Tnp3xxx,
            0x20 => Self::Iso14443_4,
            0x40 => Self::Iso18092,
            _ => Self::Unknown(sak),
        }
    }

    /// Event name of the type, e.g. `MIFARE_UL`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MifareMini => "MIFARE_MINI",
            Self::MifareClassic1K => "MIFARE_1K",
            Self::MifareClassic4K => "MIFARE_4K",
            Self::MifareUltralight => "MIFARE_UL",
            Self::MifarePlus => "MIFARE_PLUS",
            Self::Tnp3xxx => "TNP3XXX",
            Self::Iso14443_4 => "ISO_14443_4",
            Self::Iso18092 => "ISO_18092",
            Self::NotComplete => "NOT_COMPLETE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }

    /// Representative SAK for the type.
    pub fn nominal_sak(&self) -> u8 {
        match self {
            Self::MifareMini => 0x09,
            Self::MifareClassic1K => 0x08,
            Self::MifareClassic4K => 0x18,
            Self::MifareUltralight => 0x00,
            Self::MifarePlus => 0x10,
            Self::Tnp3xxx => 0x01,
            Self::Iso14443_4 => 0x20,
            Self::Iso18092 => 0x40,
            Self::NotComplete => 0x04,
            Self::Unknown(sak) => *sak,
        }
    }

    /// Check if this is a known card type.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_) | Self::NotComplete)
    }

    /// MIFARE Classic family (sector based, keyed access).
    pub fn is_mifare_classic(&self) -> bool {
        matches!(
            self,
            Self::MifareMini | Self::MifareClassic1K | Self::MifareClassic4K
        )
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
