//! NDEF record model and single-record parsing.
//!
//! Record layout (NFC Forum NDEF 1.0):
//!
//! ```text
//! +----+----+----+----+----+-----+
//! | MB | ME | CF | SR | IL | TNF |   header byte
//! +----+----+----+----+----+-----+
//! | TYPE LENGTH                  |   1 byte
//! | PAYLOAD LENGTH               |   1 byte (SR set) or 4 bytes big-endian
//! | ID LENGTH                    |   1 byte, only when IL is set
//! | TYPE                         |
//! | ID                           |
//! | PAYLOAD                      |
//! +------------------------------+
//! ```

use crate::error::{NdefError, Result};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Message Begin flag.
pub const FLAG_MB: u8 = 0x80;
/// Message End flag.
pub const FLAG_ME: u8 = 0x40;
/// Chunk flag.
pub const FLAG_CF: u8 = 0x20;
/// Short Record flag (1-byte payload length).
pub const FLAG_SR: u8 = 0x10;
/// ID Length present flag.
pub const FLAG_IL: u8 = 0x08;
/// Mask of the Type Name Format bits.
pub const TNF_MASK: u8 = 0x07;

/// Well-known record type `T`.
pub const RTD_TEXT: &[u8] = b"T";
/// Well-known record type `U`.
pub const RTD_URI: &[u8] = b"U";

/// URI identifier codes of the well-known URI record.
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// Type Name Format of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tnf {
    Empty = 0x00,
    WellKnown = 0x01,
    MimeMedia = 0x02,
    AbsoluteUri = 0x03,
    External = 0x04,
    Unknown = 0x05,
    Unchanged = 0x06,
    Reserved = 0x07,
}

impl Tnf {
    /// Decode the TNF from the low three bits of a header byte.
    pub fn from_header(header: u8) -> Self {
        match header & TNF_MASK {
            0x00 => Self::Empty,
            0x01 => Self::WellKnown,
            0x02 => Self::MimeMedia,
            0x03 => Self::AbsoluteUri,
            0x04 => Self::External,
            0x05 => Self::Unknown,
            0x06 => Self::Unchanged,
            _ => Self::Reserved,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Decoded content of a well-known Text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload {
    pub language: String,
    pub text: String,
    pub utf16: bool,
}

/// A single NDEF record.
///
/// Payloads are kept as raw bytes; the decoder never validates their content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    tnf: Tnf,
    record_type: Vec<u8>,
    id: Option<Vec<u8>>,
    payload: Vec<u8>,
    chunked: bool,
}

impl NdefRecord {
    pub fn new(tnf: Tnf, record_type: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            tnf,
            record_type: record_type.into(),
            id: None,
            payload: payload.into(),
            chunked: false,
        }
    }

    /// Attach a record id.
    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a well-known Text record (UTF-8).
    ///
    /// # Examples
    ///
    /// ```
    /// use tagbridge_ndef::NdefRecord;
    ///
    /// let record = NdefRecord::text("en", "hi");
    /// assert_eq!(record.payload(), &[0x02, b'e', b'n', b'h', b'i']);
    /// ```
    pub fn text(language: &str, text: &str) -> Self {
        let language = &language.as_bytes()[..language.len().min(0x3F)];
        let mut payload = Vec::with_capacity(1 + language.len() + text.len());
        payload.push(language.len() as u8);
        payload.extend_from_slice(language);
        payload.extend_from_slice(text.as_bytes());
        Self::new(Tnf::WellKnown, RTD_TEXT, payload)
    }

    /// Build a well-known URI record, abbreviating the longest known prefix.
    pub fn uri(uri: &str) -> Self {
        let (code, rest) = URI_PREFIXES
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, prefix)| uri.starts_with(**prefix))
            .max_by_key(|(_, prefix)| prefix.len())
            .map(|(code, prefix)| (code as u8, &uri[prefix.len()..]))
            .unwrap_or((0, uri));

        let mut payload = Vec::with_capacity(1 + rest.len());
        payload.push(code);
        payload.extend_from_slice(rest.as_bytes());
        Self::new(Tnf::WellKnown, RTD_URI, payload)
    }

    pub fn tnf(&self) -> Tnf {
        self.tnf
    }

    pub fn record_type(&self) -> &[u8] {
        &self.record_type
    }

    pub fn id(&self) -> Option<&[u8]> {
        self.id.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the CF flag was set on the wire.
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    fn is_well_known(&self, rtd: &[u8]) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type == rtd
    }

    /// Decode a well-known Text payload.
    ///
    /// Returns `None` for other record types or a status byte that claims
    /// more language bytes than the payload holds.
    pub fn text_content(&self) -> Option<TextPayload> {
        if !self.is_well_known(RTD_TEXT) {
            return None;
        }
        let (&status, rest) = self.payload.split_first()?;
        let language_len = usize::from(status & 0x3F);
        if language_len > rest.len() {
            return None;
        }
        let (language, body) = rest.split_at(language_len);
        let utf16 = status & 0x80 != 0;

        let text = if utf16 {
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            String::from_utf8_lossy(body).into_owned()
        };

        Some(TextPayload {
            language: String::from_utf8_lossy(language).into_owned(),
            text,
            utf16,
        })
    }

    /// Decode a well-known URI payload, expanding the identifier code.
    pub fn uri_content(&self) -> Option<String> {
        if !self.is_well_known(RTD_URI) {
            return None;
        }
        let (&code, rest) = self.payload.split_first()?;
        let prefix = URI_PREFIXES.get(usize::from(code)).copied().unwrap_or("");
        Some(format!("{prefix}{}", String::from_utf8_lossy(rest)))
    }

    fn is_short(&self) -> bool {
        self.payload.len() <= usize::from(u8::MAX)
    }

    /// Number of bytes this record occupies when encoded.
    pub fn encoded_len(&self) -> usize {
        let payload_len_field = if self.is_short() { 1 } else { 4 };
        let id_fields = self.id.as_ref().map_or(0, |id| 1 + id.len());
        2 + payload_len_field + id_fields + self.record_type.len() + self.payload.len()
    }

    /// Encode the record, setting MB and ME as requested.
    ///
    /// Type and id longer than 255 bytes are truncated to fit their length
    /// fields.
    pub fn encode_into(&self, buf: &mut BytesMut, first: bool, last: bool) {
        let record_type = &self.record_type[..self.record_type.len().min(255)];
        let id = self.id.as_deref().map(|id| &id[..id.len().min(255)]);

        let mut header = self.tnf.as_u8();
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        if self.chunked {
            header |= FLAG_CF;
        }
        if self.is_short() {
            header |= FLAG_SR;
        }
        if id.is_some() {
            header |= FLAG_IL;
        }

        buf.reserve(self.encoded_len());
        buf.put_u8(header);
        buf.put_u8(record_type.len() as u8);
        if self.is_short() {
            buf.put_u8(self.payload.len() as u8);
        } else {
            buf.put_u32(self.payload.len() as u32);
        }
        if let Some(id) = id {
            buf.put_u8(id.len() as u8);
        }
        buf.put_slice(record_type);
        if let Some(id) = id {
            buf.put_slice(id);
        }
        buf.put_slice(&self.payload);
    }
}

/// A record parsed from the wire plus its header flags.
#[derive(Debug)]
pub(crate) struct ParsedRecord {
    pub record: NdefRecord,
    pub message_end: bool,
    pub consumed: usize,
}

/// Sequential reader over a byte slice that reports truncation with offsets.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8]> {
        let available = self.bytes.len() - self.pos;
        if len > available {
            return Err(NdefError::truncated(field, self.pos, len, available));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(field, 1)?[0])
    }
}

/// Parse the record starting at `offset`.
pub(crate) fn parse_record(bytes: &[u8], offset: usize) -> Result<ParsedRecord> {
    let mut cursor = Cursor { bytes, pos: offset };

    let header = cursor.u8("record header")?;
    let type_len = usize::from(cursor.u8("type length")?);
    let payload_len = if header & FLAG_SR != 0 {
        usize::from(cursor.u8("payload length")?)
    } else {
        let raw = cursor.take("payload length", 4)?;
        u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
    };
    let id_len = if header & FLAG_IL != 0 {
        Some(usize::from(cursor.u8("id length")?))
    } else {
        None
    };

    let record_type = cursor.take("type", type_len)?.to_vec();
    let id = match id_len {
        Some(len) => Some(cursor.take("id", len)?.to_vec()),
        None => None,
    };
    let payload = cursor.take("payload", payload_len)?.to_vec();

    Ok(ParsedRecord {
        record: NdefRecord {
            tnf: Tnf::from_header(header),
            record_type,
            id,
            payload,
            chunked: header & FLAG_CF != 0,
        },
        message_end: header & FLAG_ME != 0,
        consumed: cursor.pos - offset,
    })
}
