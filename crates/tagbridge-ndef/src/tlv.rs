//! TLV blocks of NFC Forum Type 2 tags.
//!
//! The data area of a Type 2 tag (and the data blocks of a MIFARE Classic
//! NFC sector) is a sequence of TLV blocks. The NDEF message lives in the
//! value of the first `0x03` block. Readers fetch memory in fixed chunks, so
//! [`locate_ndef`] works on a prefix and reports how many bytes it needs when
//! the prefix is too short to decide.

use crate::{error::NdefError, message::NdefMessage};

pub const TLV_NULL: u8 = 0x00;
pub const TLV_LOCK_CONTROL: u8 = 0x01;
pub const TLV_MEMORY_CONTROL: u8 = 0x02;
pub const TLV_NDEF_MESSAGE: u8 = 0x03;
pub const TLV_PROPRIETARY: u8 = 0xFD;
pub const TLV_TERMINATOR: u8 = 0xFE;

/// Marker byte introducing a 3-byte length field.
const LONG_LENGTH_MARKER: u8 = 0xFF;

/// Result of scanning a TLV area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvLocation {
    /// NDEF message value starts at `offset` and spans `length` bytes.
    /// The value itself may extend past the scanned prefix.
    Found { offset: usize, length: usize },

    /// The scan ran off the end of the prefix; at least `needed` bytes are
    /// required to continue.
    NeedMore { needed: usize },

    /// A terminator was reached before any NDEF message block.
    Absent,
}

/// Find the NDEF message block in a TLV area.
///
/// # Examples
///
/// ```
/// use tagbridge_ndef::tlv::{TlvLocation, locate_ndef};
///
/// // NULL padding, then an NDEF TLV of 5 bytes
/// let area = [0x00, 0x00, 0x03, 0x05, 0xD1];
/// assert_eq!(locate_ndef(&area), TlvLocation::Found { offset: 4, length: 5 });
///
/// assert_eq!(locate_ndef(&[0xFE]), TlvLocation::Absent);
/// assert_eq!(locate_ndef(&[0x01, 0x03]), TlvLocation::NeedMore { needed: 6 });
/// ```
pub fn locate_ndef(area: &[u8]) -> TlvLocation {
    let mut pos = 0;

    loop {
        let Some(&tag) = area.get(pos) else {
            return TlvLocation::NeedMore { needed: pos + 1 };
        };

        match tag {
            TLV_NULL => {
                pos += 1;
                continue;
            }
            TLV_TERMINATOR => return TlvLocation::Absent,
            _ => {}
        }

        let (length, header_len) = match area.get(pos + 1) {
            None => return TlvLocation::NeedMore { needed: pos + 2 },
            Some(&LONG_LENGTH_MARKER) => match area.get(pos + 2..pos + 4) {
                Some(raw) => (usize::from(u16::from_be_bytes([raw[0], raw[1]])), 4),
                None => return TlvLocation::NeedMore { needed: pos + 4 },
            },
            Some(&short) => (usize::from(short), 2),
        };

        let value_offset = pos + header_len;
        if tag == TLV_NDEF_MESSAGE {
            return TlvLocation::Found {
                offset: value_offset,
                length,
            };
        }

        // Lock control, memory control, proprietary and unknown blocks are
        // skipped by length.
        pos = value_offset + length;
    }
}

/// Decode the NDEF message held in a complete TLV area.
///
/// A missing NDEF block yields an empty message. A block whose declared
/// length overruns the area yields a partial message decoded from the bytes
/// that are present.
pub fn decode_area(area: &[u8]) -> NdefMessage {
    match locate_ndef(area) {
        TlvLocation::Found { offset, length } => {
            let available = area.len() - offset;
            if length > available {
                let message = NdefMessage::decode(&area[offset..]);
                // A record cut mid-way says more than the missing ME record
                if let Some(partial) = message.partial() {
                    if !matches!(partial.cause, NdefError::MissingMessageEnd { .. }) {
                        return message;
                    }
                }
                let cause = NdefError::TlvOverrun {
                    offset,
                    length,
                    available,
                };
                NdefMessage::with_partial(message.into_records(), offset, cause)
            } else {
                NdefMessage::decode(&area[offset..offset + length])
            }
        }
        TlvLocation::NeedMore { .. } | TlvLocation::Absent => NdefMessage::empty(),
    }
}

/// Wrap an encoded message in an NDEF TLV followed by a terminator.
pub fn wrap_message(message: &[u8]) -> Vec<u8> {
    let mut area = Vec::with_capacity(message.len() + 5);
    area.push(TLV_NDEF_MESSAGE);
    if message.len() < usize::from(LONG_LENGTH_MARKER) {
        area.push(message.len() as u8);
    } else {
        area.push(LONG_LENGTH_MARKER);
        area.extend_from_slice(&(message.len().min(usize::from(u16::MAX)) as u16).to_be_bytes());
    }
    area.extend_from_slice(message);
    area.push(TLV_TERMINATOR);
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NdefRecord;
    use rstest::rstest;

    #[rstest]
    #[case(&[0x03, 0x00, 0xFE], TlvLocation::Found { offset: 2, length: 0 })]
    #[case(&[0x00, 0x00, 0x03, 0x10], TlvLocation::Found { offset: 4, length: 16 })]
    #[case(&[0x01, 0x03, 0xA0, 0x10, 0x44, 0x03, 0x02], TlvLocation::Found { offset: 7, length: 2 })]
    #[case(&[0x03, 0xFF, 0x01, 0x2C], TlvLocation::Found { offset: 4, length: 300 })]
    #[case(&[0xFD, 0x01, 0x99, 0xFE], TlvLocation::Absent)]
    #[case(&[], TlvLocation::NeedMore { needed: 1 })]
    #[case(&[0x00, 0x00], TlvLocation::NeedMore { needed: 3 })]
    #[case(&[0x03], TlvLocation::NeedMore { needed: 2 })]
    #[case(&[0x03, 0xFF, 0x01], TlvLocation::NeedMore { needed: 4 })]
    #[case(&[0x02, 0x08, 0x00], TlvLocation::NeedMore { needed: 11 })]
    fn test_locate_ndef(#[case] area: &[u8], #[case] expected: TlvLocation) {
        assert_eq!(locate_ndef(area), expected);
    }

    #[test]
    fn test_decode_area_roundtrip() {
        let message = NdefMessage::from_records(vec![NdefRecord::text("en", "hello")]);
        let mut area = vec![0x01, 0x03, 0xA0, 0x0C, 0x44];
        area.extend(wrap_message(&message.to_bytes()));
        area.resize(48, 0x00);

        assert_eq!(decode_area(&area), message);
    }

    #[test]
    fn test_decode_area_without_ndef_block() {
        let area = [0xFE, 0x00, 0x00, 0x00];
        let message = decode_area(&area);
        assert!(message.is_empty());
        assert!(!message.is_partial());
    }

    #[test]
    fn test_decode_area_empty_ndef_block() {
        let message = decode_area(&[0x03, 0x00, 0xFE, 0x00]);
        assert!(message.is_empty());
        assert!(!message.is_partial());
    }

    #[test]
    fn test_decode_area_overrun_is_partial() {
        let encoded = NdefMessage::from_records(vec![NdefRecord::text("en", "abc")]).to_bytes();
        let mut area = vec![TLV_NDEF_MESSAGE, (encoded.len() + 20) as u8];
        area.extend_from_slice(&encoded);

        let message = decode_area(&area);
        assert_eq!(message.len(), 1);
        assert!(matches!(
            message.partial().unwrap().cause,
            NdefError::TlvOverrun { .. }
        ));
    }

    #[test]
    fn test_decode_area_without_message_end_is_partial() {
        let record = NdefRecord::text("en", "abc");
        let mut encoded = bytes::BytesMut::new();
        record.encode_into(&mut encoded, true, false);

        let message = decode_area(&wrap_message(&encoded));
        assert_eq!(message.len(), 1);
        assert!(matches!(
            message.partial().unwrap().cause,
            NdefError::MissingMessageEnd { .. }
        ));
    }

    #[test]
    fn test_decode_area_overrun_without_message_end() {
        let record = NdefRecord::text("en", "abc");
        let mut encoded = bytes::BytesMut::new();
        record.encode_into(&mut encoded, true, false);
        let mut area = vec![TLV_NDEF_MESSAGE, (encoded.len() + 20) as u8];
        area.extend_from_slice(&encoded);

        let message = decode_area(&area);
        assert_eq!(message.len(), 1);
        assert!(matches!(
            message.partial().unwrap().cause,
            NdefError::TlvOverrun { .. }
        ));
    }

    #[test]
    fn test_wrap_long_message() {
        let payload = vec![0x42; 300];
        let area = wrap_message(&payload);
        assert_eq!(&area[..4], &[0x03, 0xFF, 0x01, 0x2C]);
        assert_eq!(area.last(), Some(&TLV_TERMINATOR));
        assert_eq!(locate_ndef(&area), TlvLocation::Found { offset: 4, length: 300 });
    }
}
