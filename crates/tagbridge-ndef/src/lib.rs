//! NDEF message decoding for contactless tags.
//!
//! The decoder walks record headers structurally and never validates payload
//! content. It is total over arbitrary input: a malformed record ends the
//! walk, the records before it are kept, and the message carries a
//! [`PartialDecode`] marker describing where and why decoding stopped.
//!
//! # Examples
//!
//! ```
//! use tagbridge_ndef::{NdefMessage, NdefRecord, tlv};
//!
//! let message = NdefMessage::from_records(vec![NdefRecord::text("en", "hi")]);
//! let area = tlv::wrap_message(&message.to_bytes());
//!
//! let decoded = tlv::decode_area(&area);
//! assert_eq!(decoded.records()[0].payload(), &[0x02, b'e', b'n', b'h', b'i']);
//! ```

pub mod error;
pub mod message;
pub mod record;
pub mod tlv;

pub use error::{NdefError, Result};
pub use message::{NdefMessage, PartialDecode};
pub use record::{NdefRecord, TextPayload, Tnf};
pub use tlv::TlvLocation;
