//! Event records published for each card presentation.
//!
//! A [`TagEvent`] always names the card (`uid`, `type`) and carries at most
//! one body: the decoded NDEF records, or the raw sector dump with the SAK.
//! Cards neither strategy can read get the bare identification.
//!
//! # Examples
//!
//! ```
//! use tagbridge_core::Uid;
//! use tagbridge_hardware::RawTag;
//! use tagbridge_ndef::NdefMessage;
//! use tagbridge_scanner::event::{TagContents, encode};
//!
//! let uid = Uid::new(&[0x04, 0xAB, 0x3C, 0x9F]).unwrap();
//! let tag = RawTag::new(uid, 0x0044, 0x00);
//!
//! let event = encode(&tag, TagContents::Ndef(NdefMessage::empty()));
//! assert_eq!(
//!     event.to_json().unwrap(),
//!     r#"{"uid":"04AB3C9F","type":"MIFARE_UL","records":[]}"#
//! );
//! ```

use serde::{Serialize, Serializer};
use tagbridge_core::{TagType, Uid, codec};
use tagbridge_hardware::{RawTag, SectorData};
use tagbridge_ndef::{NdefMessage, NdefRecord};

/// What was read from a card, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum TagContents {
    Ndef(NdefMessage),

    Sectors { sak: u8, data: SectorData },

    /// The reader has no way to read this card type.
    Unrecognized,
}

/// One NDEF record as published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub tnf: u8,

    /// Record type rendered as text, e.g. `"T"`.
    #[serde(rename = "type")]
    pub record_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Length of the whole record as stored.
    pub encoded_length: usize,

    pub payload_length: usize,

    /// Payload in uppercase hex.
    pub payload: String,

    /// Payload with control bytes shown as `.`.
    pub payload_ascii: String,
}

impl From<&NdefRecord> for RecordView {
    fn from(record: &NdefRecord) -> Self {
        Self {
            tnf: record.tnf().as_u8(),
            record_type: codec::to_ascii(record.record_type()),
            id: record.id().map(codec::to_ascii),
            encoded_length: record.encoded_len(),
            payload_length: record.payload().len(),
            payload: codec::to_hex(record.payload()),
            payload_ascii: codec::to_ascii(record.payload()),
        }
    }
}

/// Where NDEF decoding stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeErrorView {
    pub offset: usize,
    pub message: String,
}

/// Where a sector read stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialReadView {
    pub failed_unit: u16,
    pub reason: String,
}

/// Event body; flattened into the event object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventBody {
    Ndef {
        records: Vec<RecordView>,

        #[serde(rename = "decodeError", skip_serializing_if = "Option::is_none")]
        decode_error: Option<DecodeErrorView>,
    },

    Sectors {
        /// SAK as two hex digits.
        sak: String,

        data: String,

        #[serde(skip_serializing_if = "Option::is_none")]
        partial: Option<PartialReadView>,
    },

    Unrecognized {},
}

/// A card presentation ready for publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagEvent {
    uid: Uid,

    #[serde(rename = "type", serialize_with = "serialize_tag_type")]
    tag_type: TagType,

    #[serde(flatten)]
    body: EventBody,
}

fn serialize_tag_type<S: Serializer>(tag_type: &TagType, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(tag_type.name())
}

impl TagEvent {
    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    pub fn body(&self) -> &EventBody {
        &self.body
    }

    /// Render as a compact JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Build the event for a card and what was read from it.
pub fn encode(tag: &RawTag, contents: TagContents) -> TagEvent {
    let body = match contents {
        TagContents::Ndef(message) => EventBody::Ndef {
            records: message.records().iter().map(RecordView::from).collect(),
            decode_error: message.partial().map(|partial| DecodeErrorView {
                offset: partial.offset,
                message: partial.cause.to_string(),
            }),
        },
        TagContents::Sectors { sak, data } => EventBody::Sectors {
            sak: codec::to_hex(&[sak]),
            data: codec::to_hex(data.bytes()),
            partial: data.partial().map(|partial| PartialReadView {
                failed_unit: partial.failed_unit,
                reason: partial.reason.clone(),
            }),
        },
        TagContents::Unrecognized => EventBody::Unrecognized {},
    };

    TagEvent {
        uid: tag.uid.clone(),
        tag_type: tag.tag_type,
        body,
    }
}
