use super::codec::{HostFrame, Pn532Codec, Pn532Frame};
use crate::{
    HardwareError, Result,
    layout::{MemoryLayout, PageRange, UnitKind},
    traits::{PresenceResult, RawTag, ReadStrategy, TagReader},
    types::{ReaderInfo, SectorData},
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use tagbridge_core::{TagType, Uid};
use tagbridge_ndef::{
    NdefMessage,
    tlv::{self, TlvLocation},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

/// PN532 command codes.
pub mod command {
    pub const GET_FIRMWARE_VERSION: u8 = 0x02;
    pub const SAM_CONFIGURATION: u8 = 0x14;
    pub const RF_CONFIGURATION: u8 = 0x32;
    pub const IN_DATA_EXCHANGE: u8 = 0x40;
    pub const IN_LIST_PASSIVE_TARGET: u8 = 0x4A;
    pub const IN_RELEASE: u8 = 0x52;
}

/// MIFARE commands tunneled through InDataExchange.
mod mifare {
    pub const AUTH_KEY_A: u8 = 0x60;
    pub const READ: u8 = 0x30;

    /// Bytes returned by one READ (four pages or one block).
    pub const READ_SIZE: usize = 16;
}

/// Public key A of NFC Forum formatted MIFARE Classic sectors.
pub const NFC_FORUM_KEY: [u8; 6] = [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7];

/// Factory transport key of MIFARE Classic sectors.
pub const TRANSPORT_KEY: [u8; 6] = [0xFF; 6];

/// Magic number of a Type 2 capability container.
const CC_MAGIC: u8 = 0xE1;

/// Capability container page of Type 2 tags.
const CC_PAGE: u8 = 3;

const BAUD_106_TYPE_A: u8 = 0x00;

/// RFConfiguration item for MxRtyATR, MxRtyPSL and MxRtyPassiveActivation.
const RF_ITEM_MAX_RETRIES: u8 = 0x05;

/// One activation attempt per InListPassiveTarget keeps a poll short.
const PASSIVE_ACTIVATION_RETRIES: u8 = 0x01;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Firmware version reported by GetFirmwareVersion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub ic: u8,
    pub version: u8,
    pub revision: u8,
    pub support: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.version, self.revision)
    }
}

/// NXP PN532 reader over a high-speed UART link.
///
/// The link is any async byte stream: a serial port, or a TCP connection to
/// a serial bridge such as ser2net. All exchanges are bounded by timeouts; a
/// poll that gets no answer within its timeout is aborted with an ACK frame
/// and reported as absent.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tokio::net::TcpStream;
/// use tagbridge_hardware::pn532::Pn532Reader;
/// use tagbridge_hardware::traits::TagReader;
///
/// # async fn example() -> tagbridge_hardware::Result<()> {
/// let stream = TcpStream::connect("192.168.1.40:4001").await?;
/// let mut reader = Pn532Reader::new(stream);
/// let firmware = reader.begin().await?;
/// println!("PN532 firmware {firmware}");
///
/// let presence = reader.poll(Duration::from_millis(50)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Pn532Reader<S> {
    framed: Framed<S, Pn532Codec>,
    name: String,
    firmware: Option<FirmwareVersion>,
    command_timeout: Duration,
    strategy: ReadStrategy,
}

impl<S> Pn532Reader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, Pn532Codec::new()),
            name: "PN532".to_string(),
            firmware: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            strategy: ReadStrategy::Ndef,
        }
    }

    /// Bound on each command exchange other than presence polls.
    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Wake the chip, configure the SAM for normal mode and read the
    /// firmware version.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InitializationFailed`] if the chip does not
    /// answer.
    pub async fn begin(&mut self) -> Result<FirmwareVersion> {
        self.send_frame(HostFrame::Wakeup).await?;

        // Normal mode, 1 s virtual card timeout, IRQ enabled
        self.command(command::SAM_CONFIGURATION, vec![0x01, 0x14, 0x01])
            .await
            .map_err(|e| HardwareError::initialization_failed(format!("SAMConfiguration: {e}")))?;

        let firmware = self
            .firmware_version()
            .await
            .map_err(|e| HardwareError::initialization_failed(format!("GetFirmwareVersion: {e}")))?;

        self.command(
            command::RF_CONFIGURATION,
            vec![RF_ITEM_MAX_RETRIES, 0xFF, 0x01, PASSIVE_ACTIVATION_RETRIES],
        )
        .await?;

        info!(ic = firmware.ic, version = %firmware, "PN532 ready");
        self.firmware = Some(firmware);
        Ok(firmware)
    }

    /// Query the chip firmware version.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the reply is short.
    pub async fn firmware_version(&mut self) -> Result<FirmwareVersion> {
        let data = self.command(command::GET_FIRMWARE_VERSION, Bytes::new()).await?;
        match data[..] {
            [ic, version, revision, support, ..] => Ok(FirmwareVersion {
                ic,
                version,
                revision,
                support,
            }),
            _ => Err(HardwareError::communication(format!(
                "short firmware version reply: {} bytes",
                data.len()
            ))),
        }
    }

    /// Send a command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the chip refuses the frame, the link fails or no
    /// reply arrives within the command timeout.
    pub async fn command(&mut self, code: u8, params: impl Into<Bytes>) -> Result<Bytes> {
        self.send_command(code, params).await?;
        let deadline = Instant::now() + self.command_timeout;
        self.read_response(code, deadline)
            .await?
            .ok_or_else(|| HardwareError::timeout(self.command_timeout.as_millis() as u64))
    }

    /// Deselect a target.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn release(&mut self, target: u8) -> Result<()> {
        let data = self.command(command::IN_RELEASE, vec![target]).await?;
        check_status(&data, "InRelease").map(|_| ())
    }

    async fn send_frame(&mut self, frame: HostFrame) -> Result<()> {
        match tokio::time::timeout(self.command_timeout, self.framed.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(HardwareError::timeout(
                self.command_timeout.as_millis() as u64
            )),
        }
    }

    /// Next frame before `deadline`, or `None` once it passes.
    async fn next_frame(&mut self, deadline: Instant) -> Result<Option<Pn532Frame>> {
        match tokio::time::timeout_at(deadline, self.framed.next()).await {
            Ok(Some(Ok(frame))) => Ok(Some(frame)),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(HardwareError::disconnected(self.name.clone())),
            Err(_) => Ok(None),
        }
    }

    /// Send a command frame and wait for the chip's ACK.
    async fn send_command(&mut self, code: u8, params: impl Into<Bytes>) -> Result<()> {
        trace!(code, "PN532 command");
        self.send_frame(HostFrame::command(code, params)).await?;

        let deadline = Instant::now() + self.command_timeout;
        loop {
            match self.next_frame(deadline).await? {
                Some(Pn532Frame::Ack) => return Ok(()),
                Some(Pn532Frame::Response { code: stale, .. }) => {
                    // Reply to an aborted command
                    debug!(code = stale, "discarding stale PN532 reply");
                }
                Some(Pn532Frame::Nack) => {
                    return Err(HardwareError::communication(format!(
                        "command {code:#04X} not acknowledged"
                    )));
                }
                Some(Pn532Frame::ApplicationError) => {
                    return Err(HardwareError::communication(format!(
                        "command {code:#04X} rejected by chip"
                    )));
                }
                Some(Pn532Frame::Corrupt { reason }) => {
                    return Err(HardwareError::communication(reason));
                }
                None => {
                    return Err(HardwareError::timeout(
                        self.command_timeout.as_millis() as u64
                    ));
                }
            }
        }
    }

    /// Wait for the reply to `code`, or `None` if `deadline` passes first.
    async fn read_response(&mut self, code: u8, deadline: Instant) -> Result<Option<Bytes>> {
        let expected = code.wrapping_add(1);
        loop {
            match self.next_frame(deadline).await? {
                Some(Pn532Frame::Response { code, data }) if code == expected => {
                    return Ok(Some(data));
                }
                Some(Pn532Frame::Response { code, .. }) => {
                    debug!(code, expected, "discarding unexpected PN532 reply");
                }
                Some(Pn532Frame::Ack) => {}
                Some(Pn532Frame::Nack) | Some(Pn532Frame::ApplicationError) => {
                    return Err(HardwareError::communication(format!(
                        "command {code:#04X} failed on chip"
                    )));
                }
                Some(Pn532Frame::Corrupt { reason }) => {
                    return Err(HardwareError::communication(reason));
                }
                None => return Ok(None),
            }
        }
    }

    async fn data_exchange(&mut self, target: u8, payload: &[u8]) -> Result<Bytes> {
        let mut params = Vec::with_capacity(payload.len() + 1);
        params.push(target);
        params.extend_from_slice(payload);

        let data = self.command(command::IN_DATA_EXCHANGE, params).await?;
        check_status(&data, "InDataExchange")
    }

    /// MIFARE READ: four pages or one block.
    async fn mifare_read(&mut self, target: u8, address: u8) -> Result<Bytes> {
        let data = self.data_exchange(target, &[mifare::READ, address]).await?;
        if data.len() < mifare::READ_SIZE {
            return Err(HardwareError::communication(format!(
                "short READ reply at {address}: {} bytes",
                data.len()
            )));
        }
        Ok(data.slice(..mifare::READ_SIZE))
    }

    async fn mifare_authenticate(&mut self, tag: &RawTag, block: u8, key: &[u8; 6]) -> Result<()> {
        let uid = tag.uid.as_bytes();
        let Some(auth_uid) = uid.len().checked_sub(4).map(|start| &uid[start..]) else {
            return Err(HardwareError::card_read(format!(
                "UID {} too short for MIFARE authentication",
                tag.uid
            )));
        };

        let mut payload = Vec::with_capacity(12);
        payload.push(mifare::AUTH_KEY_A);
        payload.push(block);
        payload.extend_from_slice(key);
        payload.extend_from_slice(auth_uid);

        self.data_exchange(tag.target, &payload).await.map(|_| ())
    }

    async fn read_ultralight_ndef(&mut self, tag: &RawTag) -> Result<NdefMessage> {
        // Pages 3..=6: capability container then the start of the data area
        let first = self.mifare_read(tag.target, CC_PAGE).await?;
        if first[0] != CC_MAGIC {
            debug!(uid = %tag.uid, "tag is not NDEF formatted");
            return Ok(NdefMessage::empty());
        }
        let data_area = usize::from(first[2]) * 8;

        let mut area = first[4..].to_vec();
        let mut next_page = u16::from(CC_PAGE) + 4;
        loop {
            match tlv::locate_ndef(&area) {
                TlvLocation::Found { offset, length } if area.len() >= offset + length => break,
                TlvLocation::Absent => return Ok(NdefMessage::empty()),
                _ => {}
            }
            if area.len() >= data_area {
                break;
            }
            let Ok(address) = u8::try_from(next_page) else {
                break;
            };
            let chunk = self.mifare_read(tag.target, address).await?;
            area.extend_from_slice(&chunk);
            next_page += 4;
        }

        area.truncate(data_area);
        Ok(tlv::decode_area(&area))
    }

    async fn read_classic_ndef(&mut self, tag: &RawTag, layout: MemoryLayout) -> Result<NdefMessage> {
        let mut area = Vec::new();
        let mut authenticated: Option<u16> = None;

        for block in layout.units(layout.default_range()) {
            match tlv::locate_ndef(&area) {
                TlvLocation::Found { offset, length } if area.len() >= offset + length => break,
                TlvLocation::Absent => return Ok(NdefMessage::empty()),
                _ => {}
            }

            let address = block_address(block)?;
            let sector = layout.sector_start(block);
            if authenticated != Some(sector) {
                match self.mifare_authenticate(tag, address, &NFC_FORUM_KEY).await {
                    Ok(()) => authenticated = Some(sector),
                    Err(HardwareError::CardReadError { .. }) if area.is_empty() => {
                        debug!(uid = %tag.uid, "NFC Forum key refused, tag is not NDEF formatted");
                        return Ok(NdefMessage::empty());
                    }
                    Err(e) => return Err(e),
                }
            }

            let chunk = self.mifare_read(tag.target, address).await?;
            area.extend_from_slice(&chunk);
        }

        Ok(tlv::decode_area(&area))
    }

    async fn read_unit(
        &mut self,
        tag: &RawTag,
        layout: &MemoryLayout,
        unit: u16,
        authenticated: &mut Option<u16>,
    ) -> Result<Bytes> {
        let address = block_address(unit)?;
        if layout.kind() == UnitKind::Block {
            let sector = layout.sector_start(unit);
            if *authenticated != Some(sector) {
                self.mifare_authenticate(tag, address, &TRANSPORT_KEY).await?;
                *authenticated = Some(sector);
            }
        }
        let data = self.mifare_read(tag.target, address).await?;
        Ok(data.slice(..layout.unit_size()))
    }
}

fn block_address(unit: u16) -> Result<u8> {
    u8::try_from(unit)
        .map_err(|_| HardwareError::invalid_data(format!("address {unit} out of range")))
}

/// Split off the status byte of an In* reply, failing on a chip error code.
fn check_status(data: &Bytes, operation: &str) -> Result<Bytes> {
    let Some(&status) = data.first() else {
        return Err(HardwareError::communication(format!(
            "{operation} reply without status"
        )));
    };
    // Bits 6-7 flag NAD and chaining; the low bits carry the error code
    match status & 0x3F {
        0x00 => Ok(data.slice(1..)),
        0x01 => Err(HardwareError::communication(format!(
            "{operation}: target timeout"
        ))),
        0x14 => Err(HardwareError::card_read(format!(
            "{operation}: MIFARE authentication failed"
        ))),
        code => Err(HardwareError::card_read(format!(
            "{operation}: chip status {code:#04X}"
        ))),
    }
}

/// Parse an InListPassiveTarget reply for 106 kbps type A.
fn parse_target(data: &[u8]) -> Result<PresenceResult> {
    match data {
        [] => Err(HardwareError::communication("empty InListPassiveTarget reply")),
        [0, ..] => Ok(PresenceResult::Absent),
        [_, target, atqa_hi, atqa_lo, sak, uid_len, rest @ ..] => {
            let uid_len = usize::from(*uid_len);
            let uid = rest.get(..uid_len).ok_or_else(|| {
                HardwareError::communication(format!(
                    "UID truncated: {} of {uid_len} bytes",
                    rest.len()
                ))
            })?;
            let atqa = u16::from_be_bytes([*atqa_hi, *atqa_lo]);
            Ok(PresenceResult::Present(
                RawTag::new(Uid::new(uid)?, atqa, *sak).with_target(*target),
            ))
        }
        _ => Err(HardwareError::communication(format!(
            "short InListPassiveTarget reply: {} bytes",
            data.len()
        ))),
    }
}

impl<S> TagReader for Pn532Reader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    async fn poll(&mut self, timeout: Duration) -> Result<PresenceResult> {
        self.send_command(
            command::IN_LIST_PASSIVE_TARGET,
            vec![0x01, BAUD_106_TYPE_A],
        )
        .await?;

        let deadline = Instant::now() + timeout;
        match self
            .read_response(command::IN_LIST_PASSIVE_TARGET, deadline)
            .await?
        {
            Some(data) => parse_target(&data),
            None => {
                trace!("no target within poll timeout");
                // An ACK aborts the pending InListPassiveTarget
                self.send_frame(HostFrame::Ack).await?;
                Ok(PresenceResult::Absent)
            }
        }
    }

    async fn read_ndef(&mut self, tag: &RawTag) -> Result<NdefMessage> {
        match tag.tag_type {
            TagType::MifareUltralight => self.read_ultralight_ndef(tag).await,
            other => match MemoryLayout::for_tag(other) {
                Some(layout) if other.is_mifare_classic() => {
                    self.read_classic_ndef(tag, layout).await
                }
                _ => Err(HardwareError::unsupported(format!("read_ndef on {other}"))),
            },
        }
    }

    async fn read_sectors(&mut self, tag: &RawTag, range: PageRange) -> Result<SectorData> {
        let layout = MemoryLayout::for_tag(tag.tag_type).ok_or_else(|| {
            HardwareError::unsupported(format!("read_sectors on {}", tag.tag_type))
        })?;

        let mut data = SectorData::new();
        let mut authenticated = None;
        for unit in layout.units(range) {
            match self.read_unit(tag, &layout, unit, &mut authenticated).await {
                Ok(bytes) => data.push_unit(&bytes),
                Err(e) => {
                    warn!(unit, uid = %tag.uid, error = %e, "sector read aborted");
                    data.mark_partial(unit, e.to_string());
                    break;
                }
            }
        }

        if let Err(e) = self.release(tag.target).await {
            debug!(error = %e, "InRelease failed");
        }
        Ok(data)
    }

    fn read_strategy(&self) -> ReadStrategy {
        self.strategy
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        let info = ReaderInfo::new(self.name.clone(), vec!["ISO14443A".to_string()])
            .with_max_baud_rate(424_000);
        Ok(match self.firmware {
            Some(firmware) => info.with_firmware_version(firmware.to_string()),
            None => info,
        })
    }
}
