//! Enum wrapper for reader dispatch and startup selection.
//!
//! Native `async fn` in traits are not object-safe, so `Box<dyn TagReader>`
//! is not available. [`AnyTagReader`] provides concrete dispatch over the
//! reader families instead, with feature-gated variants for hardware that
//! needs system libraries.
//!
//! # Examples
//!
//! ```
//! use tagbridge_hardware::devices::{AnyTagReader, ReaderSettings};
//! use tagbridge_hardware::traits::TagReader;
//!
//! #[tokio::main]
//! async fn main() -> tagbridge_hardware::Result<()> {
//!     let settings: ReaderSettings = serde_json::from_str(r#"{"family":"mock"}"#).unwrap();
//!     let reader = AnyTagReader::open(&settings).await?;
//!
//!     let info = reader.get_reader_info().await?;
//!     println!("Reader: {}", info.name);
//!     Ok(())
//! }
//! ```

use crate::mock::MockTagReader;
use crate::pn532::Pn532Reader;
use crate::traits::{PresenceResult, RawTag, ReadStrategy, TagReader};
use crate::{HardwareError, NdefMessage, PageRange, ReaderInfo, Result, SectorData};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::info;

/// Which reader family to open, and where.
///
/// Deserialized from the `reader` object of the bridge settings, tagged by
/// `family`:
///
/// ```json
/// { "family": "pn532", "address": "192.168.1.40:4001" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "camelCase")]
pub enum ReaderSettings {
    /// In-memory reader with an empty field.
    #[default]
    Mock,

    /// PN532 behind a TCP serial bridge.
    #[serde(rename_all = "camelCase")]
    Pn532 {
        address: String,

        /// Bound on each chip command, in milliseconds.
        #[serde(default = "default_command_timeout_ms")]
        command_timeout_ms: u64,
    },

    /// PC/SC reader; the first listed reader when no name is given.
    #[serde(rename_all = "camelCase")]
    Pcsc {
        #[serde(default)]
        reader_name: Option<String>,
    },
}

fn default_command_timeout_ms() -> u64 {
    1000
}

/// Enum wrapper for tag reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTagReader {
    /// Mock reader for development and testing.
    Mock(MockTagReader),

    /// PN532 over a TCP serial bridge.
    Pn532(Pn532Reader<TcpStream>),

    /// PC/SC contactless reader.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(crate::pcsc::PcscReader),
}

impl AnyTagReader {
    /// Open and initialize the reader named by `settings`.
    ///
    /// A mock reader opened this way has nobody holding its handle, so its
    /// field stays empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be reached or initialized, or
    /// if its family was not compiled in.
    pub async fn open(settings: &ReaderSettings) -> Result<Self> {
        match settings {
            ReaderSettings::Mock => {
                let (reader, _handle) = MockTagReader::new();
                Ok(Self::Mock(reader))
            }
            ReaderSettings::Pn532 {
                address,
                command_timeout_ms,
            } => {
                info!(%address, "connecting to PN532");
                let stream = TcpStream::connect(address.as_str()).await.map_err(|e| {
                    HardwareError::initialization_failed(format!("connecting to {address}: {e}"))
                })?;
                stream.set_nodelay(true)?;

                let mut reader = Pn532Reader::new(stream)
                    .with_command_timeout(Duration::from_millis(*command_timeout_ms));
                reader.begin().await?;
                Ok(Self::Pn532(reader))
            }
            #[cfg(feature = "hardware-pcsc")]
            ReaderSettings::Pcsc { reader_name } => Ok(Self::Pcsc(
                crate::pcsc::PcscReader::open(reader_name.as_deref())?,
            )),
            #[cfg(not(feature = "hardware-pcsc"))]
            ReaderSettings::Pcsc { .. } => Err(HardwareError::configuration(
                "PC/SC support not compiled in (enable the hardware-pcsc feature)",
            )),
        }
    }
}

impl TagReader for AnyTagReader {
    async fn poll(&mut self, timeout: Duration) -> Result<PresenceResult> {
        match self {
            Self::Mock(reader) => reader.poll(timeout).await,
            Self::Pn532(reader) => reader.poll(timeout).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(reader) => reader.poll(timeout).await,
        }
    }

    async fn read_ndef(&mut self, tag: &RawTag) -> Result<NdefMessage> {
        match self {
            Self::Mock(reader) => reader.read_ndef(tag).await,
            Self::Pn532(reader) => reader.read_ndef(tag).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(reader) => reader.read_ndef(tag).await,
        }
    }

    async fn read_sectors(&mut self, tag: &RawTag, range: PageRange) -> Result<SectorData> {
        match self {
            Self::Mock(reader) => reader.read_sectors(tag, range).await,
            Self::Pn532(reader) => reader.read_sectors(tag, range).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(reader) => reader.read_sectors(tag, range).await,
        }
    }

    fn read_strategy(&self) -> ReadStrategy {
        match self {
            Self::Mock(reader) => reader.read_strategy(),
            Self::Pn532(reader) => reader.read_strategy(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(reader) => reader.read_strategy(),
        }
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        match self {
            Self::Mock(reader) => reader.get_reader_info().await,
            Self::Pn532(reader) => reader.get_reader_info().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(reader) => reader.get_reader_info().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"family":"mock"}"#, ReaderSettings::Mock)]
    #[case(
        r#"{"family":"pn532","address":"10.0.0.5:4001"}"#,
        ReaderSettings::Pn532 { address: "10.0.0.5:4001".to_string(), command_timeout_ms: 1000 }
    )]
    #[case(
        r#"{"family":"pn532","address":"localhost:4001","commandTimeoutMs":250}"#,
        ReaderSettings::Pn532 { address: "localhost:4001".to_string(), command_timeout_ms: 250 }
    )]
    #[case(r#"{"family":"pcsc"}"#, ReaderSettings::Pcsc { reader_name: None })]
    #[case(
        r#"{"family":"pcsc","readerName":"ACS ACR122U PICC Interface"}"#,
        ReaderSettings::Pcsc { reader_name: Some("ACS ACR122U PICC Interface".to_string()) }
    )]
    fn test_reader_settings_deserialize(#[case] json: &str, #[case] expected: ReaderSettings) {
        let settings: ReaderSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings, expected);
    }

    #[test]
    fn test_unknown_family_is_rejected() {
        assert!(serde_json::from_str::<ReaderSettings>(r#"{"family":"rc522"}"#).is_err());
    }

    #[tokio::test]
    async fn test_open_mock() {
        let mut reader = AnyTagReader::open(&ReaderSettings::Mock).await.unwrap();
        assert_eq!(
            reader.poll(Duration::from_millis(5)).await.unwrap(),
            PresenceResult::Absent
        );
        assert_eq!(reader.read_strategy(), ReadStrategy::Ndef);
    }

    #[tokio::test]
    async fn test_dispatch_to_mock() {
        let (mock, _handle) = MockTagReader::with_name("Bench".to_string());
        let reader = AnyTagReader::Mock(mock);
        assert_eq!(reader.get_reader_info().await.unwrap().name, "Bench");
    }

    #[cfg(not(feature = "hardware-pcsc"))]
    #[tokio::test]
    async fn test_open_pcsc_without_feature() {
        let result = AnyTagReader::open(&ReaderSettings::Pcsc { reader_name: None }).await;
        assert!(matches!(result, Err(HardwareError::ConfigurationError { .. })));
    }
}
