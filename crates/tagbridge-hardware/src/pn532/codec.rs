//! Tokio codec for PN532 high-speed UART frames.
//!
//! This module frames host commands and decodes chip replies so a
//! [`Pn532Reader`](super::Pn532Reader) can drive the chip over any async
//! byte stream through Tokio's `Framed`.
//!
//! # Wire Format
//!
//! ```text
//! Information frame:  00 00 FF LEN LCS TFI PD0 .. PDn DCS 00
//! Extended frame:     00 00 FF FF FF LENM LENL LCS TFI PD0 .. PDn DCS 00
//! ACK frame:          00 00 FF 00 FF 00
//! NACK frame:         00 00 FF FF 00 00
//! Error frame:        00 00 FF 01 FF 7F 81 00
//! ```
//!
//! `LEN` counts TFI and data bytes, `LCS` makes `LEN + LCS == 0` and `DCS`
//! makes `TFI + PD0 + .. + PDn + DCS == 0` (mod 256). TFI is `D4` from host
//! to chip and `D5` from chip to host.
//!
//! # Error Handling
//!
//! Checksum failures are reported as [`Pn532Frame::Corrupt`] items rather
//! than decoder errors: an error ends a `Framed` stream, while a corrupted
//! reply only fails the exchange that was waiting for it.

use crate::error::{HardwareError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frame identifier, host to chip.
pub const TFI_HOST: u8 = 0xD4;

/// Frame identifier, chip to host.
pub const TFI_CHIP: u8 = 0xD5;

/// Application error frame identifier.
const TFI_ERROR: u8 = 0x7F;

const START_CODE: [u8; 2] = [0x00, 0xFF];
const ACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

/// HSU wakeup: two sync bytes then enough idle bytes for the chip to leave
/// power-down.
const WAKEUP_SEQUENCE: [u8; 16] = [
    0x55, 0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Largest information field the chip produces (extended frames included).
const DEFAULT_MAX_FRAME_SIZE: usize = 265;

/// Frames sent by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostFrame {
    /// Command code plus parameters.
    Command { code: u8, params: Bytes },

    /// ACK, also used to abort a pending command.
    Ack,

    /// HSU wakeup sequence.
    Wakeup,
}

impl HostFrame {
    pub fn command(code: u8, params: impl Into<Bytes>) -> Self {
        Self::Command {
            code,
            params: params.into(),
        }
    }
}

/// Frames received from the chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pn532Frame {
    Ack,
    Nack,

    /// Reply to a command: `code` is the command code plus one.
    Response { code: u8, data: Bytes },

    /// Syntax error reported by the chip.
    ApplicationError,

    /// A frame that failed its checksums or carried an unknown TFI.
    Corrupt { reason: String },
}

/// PN532 HSU frame codec.
#[derive(Debug)]
pub struct Pn532Codec {
    max_frame_size: usize,
}

impl Pn532Codec {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for Pn532Codec {
    fn default() -> Self {
        Self::new()
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
        .wrapping_neg()
}

impl Decoder for Pn532Codec {
    type Item = Pn532Frame;
    type Error = HardwareError;

    /// Decode one chip frame.
    ///
    /// Bytes before a start code (preambles, postambles, line noise) are
    /// discarded.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(start) = src.windows(2).position(|w| w == START_CODE) else {
            // Keep a trailing 0x00 that may begin the next start code
            let keep = usize::from(src.last() == Some(&0x00));
            src.advance(src.len() - keep);
            return Ok(None);
        };
        src.advance(start);

        if src.len() < 4 {
            return Ok(None);
        }

        let (len, header_len) = match (src[2], src[3]) {
            (0x00, 0xFF) => {
                src.advance(4);
                return Ok(Some(Pn532Frame::Ack));
            }
            (0xFF, 0x00) => {
                src.advance(4);
                return Ok(Some(Pn532Frame::Nack));
            }
            (0xFF, 0xFF) => {
                if src.len() < 7 {
                    return Ok(None);
                }
                let len = usize::from(u16::from_be_bytes([src[4], src[5]]));
                if checksum(&src[4..6]) != src[6] {
                    src.advance(START_CODE.len());
                    return Ok(Some(Pn532Frame::Corrupt {
                        reason: "extended length checksum mismatch".to_string(),
                    }));
                }
                (len, 7)
            }
            (len, lcs) => {
                if len.wrapping_add(lcs) != 0 {
                    src.advance(START_CODE.len());
                    return Ok(Some(Pn532Frame::Corrupt {
                        reason: format!("length checksum mismatch (LEN={len:#04X}, LCS={lcs:#04X})"),
                    }));
                }
                (usize::from(len), 4)
            }
        };

        if len == 0 || len > self.max_frame_size {
            src.advance(header_len);
            return Ok(Some(Pn532Frame::Corrupt {
                reason: format!("invalid frame length {len}"),
            }));
        }

        let total = header_len + len + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(header_len);
        let dcs = frame[len];
        frame.truncate(len);

        if checksum(&frame) != dcs {
            return Ok(Some(Pn532Frame::Corrupt {
                reason: "data checksum mismatch".to_string(),
            }));
        }

        let frame = frame.freeze();
        Ok(Some(match (frame[0], frame.len()) {
            (TFI_ERROR, 1) => Pn532Frame::ApplicationError,
            (TFI_CHIP, 2..) => Pn532Frame::Response {
                code: frame[1],
                data: frame.slice(2..),
            },
            (tfi, _) => Pn532Frame::Corrupt {
                reason: format!("unexpected TFI {tfi:#04X}"),
            },
        }))
    }
}

impl Encoder<HostFrame> for Pn532Codec {
    type Error = HardwareError;

    fn encode(&mut self, item: HostFrame, dst: &mut BytesMut) -> Result<()> {
        let (code, params) = match item {
            HostFrame::Ack => {
                dst.extend_from_slice(&ACK_FRAME);
                return Ok(());
            }
            HostFrame::Wakeup => {
                dst.extend_from_slice(&WAKEUP_SEQUENCE);
                return Ok(());
            }
            HostFrame::Command { code, params } => (code, params),
        };

        let len = params.len() + 2;
        if len > self.max_frame_size {
            return Err(HardwareError::invalid_data(format!(
                "command frame of {len} bytes exceeds {}",
                self.max_frame_size
            )));
        }

        dst.reserve(len + 10);
        dst.put_slice(&[0x00, 0x00, 0xFF]);
        if len <= 0xFF {
            let len = len as u8;
            dst.put_u8(len);
            dst.put_u8(len.wrapping_neg());
        } else {
            let len = (len as u16).to_be_bytes();
            dst.put_slice(&[0xFF, 0xFF]);
            dst.put_slice(&len);
            dst.put_u8(checksum(&len));
        }

        let body_start = dst.len();
        dst.put_u8(TFI_HOST);
        dst.put_u8(code);
        dst.put_slice(&params);
        let dcs = checksum(&dst[body_start..]);
        dst.put_u8(dcs);
        dst.put_u8(0x00);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Pn532Frame> {
        let mut codec = Pn532Codec::new();
        let mut buf = BytesMut::from(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_encode_get_firmware_version() {
        let mut codec = Pn532Codec::new();
        let mut buf = BytesMut::new();
        codec.encode(HostFrame::command(0x02, Bytes::new()), &mut buf).unwrap();

        assert_eq!(
            &buf[..],
            &[0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD4, 0x02, 0x2A, 0x00]
        );
    }

    #[test]
    fn test_encode_sam_configuration() {
        let mut codec = Pn532Codec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(HostFrame::command(0x14, vec![0x01, 0x14, 0x01]), &mut buf)
            .unwrap();

        assert_eq!(
            &buf[..],
            &[0x00, 0x00, 0xFF, 0x05, 0xFB, 0xD4, 0x14, 0x01, 0x14, 0x01, 0x02, 0x00]
        );
    }

    #[test]
    fn test_encode_ack_and_wakeup() {
        let mut codec = Pn532Codec::new();
        let mut buf = BytesMut::new();
        codec.encode(HostFrame::Ack, &mut buf).unwrap();
        assert_eq!(&buf[..], &ACK_FRAME);

        buf.clear();
        codec.encode(HostFrame::Wakeup, &mut buf).unwrap();
        assert_eq!(&buf[..2], &[0x55, 0x55]);
    }

    #[test]
    fn test_decode_ack_then_response() {
        // ACK followed by the firmware version reply (IC=0x32, 1.6)
        let bytes = [
            0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x06, 0xFA, 0xD5, 0x03, 0x32,
            0x01, 0x06, 0x07, 0xE8, 0x00,
        ];

        let frames = decode_all(&bytes);
        assert_eq!(
            frames,
            vec![
                Pn532Frame::Ack,
                Pn532Frame::Response {
                    code: 0x03,
                    data: Bytes::from_static(&[0x32, 0x01, 0x06, 0x07]),
                },
            ]
        );
    }

    #[test]
    fn test_decode_nack_and_error_frame() {
        let bytes = [
            0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x01, 0xFF, 0x7F, 0x81, 0x00,
        ];
        assert_eq!(
            decode_all(&bytes),
            vec![Pn532Frame::Nack, Pn532Frame::ApplicationError]
        );
    }

    #[test]
    fn test_decode_partial_frame_waits() {
        let mut codec = Pn532Codec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00, 0xFF, 0x06, 0xFA, 0xD5, 0x03][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(&[0x32, 0x01, 0x06, 0x07, 0xE8, 0x00]);
        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(Pn532Frame::Response { code: 0x03, .. })
        ));
    }

    #[test]
    fn test_decode_bad_data_checksum() {
        let bytes = [0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD5, 0x15, 0x00, 0x00];
        assert!(matches!(
            decode_all(&bytes).as_slice(),
            [Pn532Frame::Corrupt { .. }]
        ));
    }

    #[test]
    fn test_decode_bad_length_checksum_resyncs() {
        // Broken header, then a valid ACK
        let bytes = [0x00, 0xFF, 0x05, 0x05, 0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];
        let frames = decode_all(&bytes);
        assert!(matches!(frames[0], Pn532Frame::Corrupt { .. }));
        assert_eq!(frames.last(), Some(&Pn532Frame::Ack));
    }

    #[test]
    fn test_decode_skips_noise() {
        let bytes = [0x55, 0x13, 0x37, 0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];
        assert_eq!(decode_all(&bytes), vec![Pn532Frame::Ack]);
    }

    #[test]
    fn test_decode_extended_frame() {
        let mut data = vec![0xD5, 0x41, 0x00];
        data.extend(std::iter::repeat_n(0x11, 254));
        let len = (data.len() as u16).to_be_bytes();

        let mut bytes = vec![0x00, 0x00, 0xFF, 0xFF, 0xFF, len[0], len[1], checksum(&len)];
        bytes.extend_from_slice(&data);
        bytes.push(checksum(&data));
        bytes.push(0x00);

        match decode_all(&bytes).as_slice() {
            [Pn532Frame::Response { code: 0x41, data }] => assert_eq!(data.len(), 255),
            other => panic!("unexpected frames: {other:?}"),
        }
    }

    #[test]
    fn test_encode_decode_checksum_agree() {
        let mut codec = Pn532Codec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(HostFrame::command(0x40, vec![0x01, 0x30, 0x04]), &mut buf)
            .unwrap();

        // Turn the host frame into a chip frame and decode it
        buf[5] = TFI_CHIP;
        let body_end = buf.len() - 2;
        let dcs = checksum(&buf[5..body_end]);
        buf[body_end] = dcs;

        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(Pn532Frame::Response { code: 0x40, .. })
        ));
    }
}
