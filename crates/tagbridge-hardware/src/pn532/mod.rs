//! NXP PN532 support.
//!
//! [`codec`] frames the chip's UART protocol for `tokio_util::codec::Framed`;
//! [`reader`] drives the chip as a [`TagReader`](crate::traits::TagReader).

pub mod codec;
pub mod reader;

pub use codec::{HostFrame, Pn532Codec, Pn532Frame};
pub use reader::{FirmwareVersion, NFC_FORUM_KEY, Pn532Reader, TRANSPORT_KEY, command};
