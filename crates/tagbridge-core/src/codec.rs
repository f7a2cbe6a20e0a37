//! Hex and ASCII rendering of raw tag bytes.
//!
//! Every downstream stage renders bytes through these functions, so the
//! output format is part of the published event contract:
//!
//! - [`to_hex`] writes two uppercase hex digits per byte with no separators.
//! - [`to_ascii`] replaces control bytes (`0x00..=0x1F`) with `.` and maps
//!   every other byte to the 8-bit character with the same value.
//!
//! # Examples
//!
//! ```
//! use tagbridge_core::codec::{decode_hex, to_ascii, to_hex};
//!
//! let payload = [0x02, b'e', b'n', b'h', b'i'];
//! assert_eq!(to_hex(&payload), "02656E6869");
//! assert_eq!(to_ascii(&payload), ".enhi");
//! assert_eq!(decode_hex("02656E6869").unwrap(), payload);
//! ```

use crate::{Error, Result};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Highest byte value rendered as `.` by [`to_ascii`].
pub const ASCII_CONTROL_MAX: u8 = 0x1F;

/// Render bytes as uppercase hex, two characters per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX_DIGITS[usize::from(byte >> 4)] as char);
        out.push(HEX_DIGITS[usize::from(byte & 0x0F)] as char);
    }
    out
}

/// Render bytes as printable characters.
///
/// Bytes `<= 0x1F` become `.`. Bytes `>= 0x80` are not UTF-8 decoded; each
/// maps to the Latin-1 character of the same value, so the output always has
/// one character per input byte.
pub fn to_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b <= ASCII_CONTROL_MAX {
                '.'
            } else {
                char::from(b)
            }
        })
        .collect()
}

/// Parse a hex string produced by [`to_hex`] back into bytes.
///
/// Both upper and lower case digits are accepted.
///
/// # Errors
///
/// Returns [`Error::InvalidHex`] if the string has an odd number of
/// characters or contains a non-hex character.
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits = text.as_bytes();
    if digits.len() % 2 != 0 {
        return Err(Error::InvalidHex {
            position: digits.len(),
            message: "odd number of digits".to_string(),
        });
    }

    let mut out = Vec::with_capacity(digits.len() / 2);
    for (index, pair) in digits.chunks_exact(2).enumerate() {
        let high = nibble(pair[0], index * 2)?;
        let low = nibble(pair[1], index * 2 + 1)?;
        out.push((high << 4) | low);
    }
    Ok(out)
}

fn nibble(digit: u8, position: usize) -> Result<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        _ => Err(Error::InvalidHex {
            position,
            message: format!("{:?} is not a hex digit", char::from(digit)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], "")]
    #[case(&[0x00], "00")]
    #[case(&[0x04, 0xAB, 0x3C, 0x9F], "04AB3C9F")]
    #[case(&[0xFF, 0x10, 0x0A], "FF100A")]
    fn test_to_hex(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(to_hex(bytes), expected);
    }

    #[rstest]
    #[case(&[], "")]
    #[case(&[0x00, 0x1F, 0x20], ".. ")]
    #[case(&[0x02, 0x65, 0x6E, 0x68, 0x69], ".enhi")]
    #[case(&[0x7F], "\u{7F}")]
    #[case(&[0xE9], "\u{E9}")]
    fn test_to_ascii(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(to_ascii(bytes), expected);
    }

    #[test]
    fn test_to_ascii_high_bytes_keep_length() {
        let bytes: Vec<u8> = (0x80..=0xFF).collect();
        assert_eq!(to_ascii(&bytes).chars().count(), bytes.len());
    }

    #[rstest]
    #[case("04AB3C9F", vec![0x04, 0xAB, 0x3C, 0x9F])]
    #[case("04ab3c9f", vec![0x04, 0xAB, 0x3C, 0x9F])]
    #[case("", vec![])]
    fn test_decode_hex_valid(#[case] input: &str, #[case] expected: Vec<u8>) {
        assert_eq!(decode_hex(input).unwrap(), expected);
    }

    #[rstest]
    #[case("ABC")]
    #[case("0G")]
    #[case("12 4")]
    fn test_decode_hex_invalid(#[case] input: &str) {
        assert!(matches!(decode_hex(input), Err(Error::InvalidHex { .. })));
    }

    #[test]
    fn test_decode_hex_reports_position() {
        match decode_hex("00Z1") {
            Err(Error::InvalidHex { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
