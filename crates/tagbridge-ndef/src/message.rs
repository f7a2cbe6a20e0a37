use crate::{
    error::NdefError,
    record::{NdefRecord, parse_record},
};
use bytes::{Bytes, BytesMut};

/// Marker attached to a message whose decoding stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDecode {
    /// Offset of the record that could not be completed.
    pub offset: usize,
    pub cause: NdefError,
}

/// Ordered sequence of NDEF records.
///
/// Decoding is total: [`NdefMessage::decode`] never fails. Records decoded
/// before a malformed one are kept and the failure is recorded in
/// [`NdefMessage::partial`].
///
/// # Examples
///
/// ```
/// use tagbridge_ndef::NdefMessage;
///
/// let message = NdefMessage::decode(&[0xD1, 0x01, 0x05, b'T', 0x02, b'e', b'n', b'h', b'i']);
/// assert_eq!(message.len(), 1);
/// assert!(message.partial().is_none());
///
/// // Second record cut short
/// let message = NdefMessage::decode(&[0x91, 0x01, 0x00, b'T', 0x51, 0x01, 0x09, b'T', 0x02]);
/// assert_eq!(message.len(), 1);
/// assert_eq!(message.partial().unwrap().offset, 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdefMessage {
    records: Vec<NdefRecord>,
    partial: Option<PartialDecode>,
}

impl NdefMessage {
    /// A message with no records.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<NdefRecord>) -> Self {
        Self {
            records,
            partial: None,
        }
    }

    /// A message that failed before any record could be decoded.
    pub fn failed(offset: usize, cause: NdefError) -> Self {
        Self::with_partial(Vec::new(), offset, cause)
    }

    /// Records decoded before a failure at `offset`.
    pub fn with_partial(records: Vec<NdefRecord>, offset: usize, cause: NdefError) -> Self {
        Self {
            records,
            partial: Some(PartialDecode { offset, cause }),
        }
    }

    /// Decode records in stored order, stopping after the ME record.
    ///
    /// An empty buffer yields an empty message. Bytes after the ME record
    /// are ignored. Running out of bytes before the ME record marks the
    /// message partial even when the last record was complete.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut records = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            match parse_record(bytes, offset) {
                Ok(parsed) => {
                    records.push(parsed.record);
                    offset += parsed.consumed;
                    if parsed.message_end {
                        return Self::from_records(records);
                    }
                }
                Err(cause) => return Self::with_partial(records, offset, cause),
            }
        }

        if records.is_empty() {
            return Self::empty();
        }
        Self::with_partial(records, offset, NdefError::MissingMessageEnd { offset })
    }

    pub fn records(&self) -> &[NdefRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<NdefRecord> {
        self.records
    }

    pub fn partial(&self) -> Option<&PartialDecode> {
        self.partial.as_ref()
    }

    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encoded size of all records.
    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(NdefRecord::encoded_len).sum()
    }

    /// Encode the records with MB on the first and ME on the last.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        let last = self.records.len().saturating_sub(1);
        for (index, record) in self.records.iter().enumerate() {
            record.encode_into(&mut buf, index == 0, index == last);
        }
        buf.freeze()
    }
}

impl From<Vec<NdefRecord>> for NdefMessage {
    fn from(records: Vec<NdefRecord>) -> Self {
        Self::from_records(records)
    }
}
