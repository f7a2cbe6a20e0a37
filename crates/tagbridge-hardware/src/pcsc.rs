//! PC/SC contactless readers (ACR122U and compatibles).
//!
//! Storage cards are driven through the PC/SC part 3 pseudo-APDUs: get data
//! for the UID, load key, general authenticate and read binary. The card type
//! comes from the card name bytes of the part 3 ATR, since PC/SC does not
//! expose the SAK.
//!
//! After a sector read that got data the card is disconnected and held as
//! halted. Polls keep reporting the cached tag until the reader signals a
//! state change, so a card left on the reader is read once.
//!
//! PC/SC calls block. Polls run on the caller's task with the status wait
//! capped at 50 ms; a card that fails to connect is retried on the next
//! poll.

use crate::{
    HardwareError, Result,
    layout::{MemoryLayout, PageRange},
    traits::{PresenceResult, RawTag, ReadStrategy, TagReader},
    types::{ReaderInfo, SectorData},
};
use pcsc::{Card, Context, Disposition, Protocols, ReaderState, Scope, ShareMode, State};
use std::ffi::CString;
use std::time::Duration;
use tagbridge_core::{TagType, Uid};
use tagbridge_ndef::NdefMessage;
use tracing::{debug, info, warn};

const APDU_GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Registered application provider id of PC/SC part 3 storage card ATRs.
const PART3_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

/// Key slot used for loaded authentication keys.
const KEY_SLOT: u8 = 0x00;

const KEY_TYPE_A: u8 = 0x60;

/// Factory transport key of MIFARE Classic sectors.
const TRANSPORT_KEY: [u8; 6] = [0xFF; 6];

const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

/// Longest a poll blocks in `SCardGetStatusChange`.
const MAX_STATUS_WAIT: Duration = Duration::from_millis(50);

/// Contactless reader behind the PC/SC service.
pub struct PcscReader {
    context: Context,
    reader: CString,
    last_state: State,
    card: Option<Card>,
    current: Option<RawTag>,
}

impl std::fmt::Debug for PcscReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscReader")
            .field("reader", &self.reader)
            .field("connected", &self.card.is_some())
            .field("current", &self.current)
            .finish()
    }
}

impl PcscReader {
    /// Open a reader by name, or the first reader the service lists.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InitializationFailed`] if the PC/SC service
    /// is unavailable or no matching reader is connected.
    pub fn open(reader_name: Option<&str>) -> Result<Self> {
        let context = Context::establish(Scope::User)
            .map_err(|e| HardwareError::initialization_failed(format!("PC/SC service: {e}")))?;

        let readers = context
            .list_readers_owned()
            .map_err(|e| HardwareError::initialization_failed(format!("listing readers: {e}")))?;

        let reader = match reader_name {
            Some(wanted) => readers
                .into_iter()
                .find(|name| name.to_string_lossy() == wanted),
            None => readers.into_iter().next(),
        }
        .ok_or_else(|| {
            HardwareError::initialization_failed(match reader_name {
                Some(wanted) => format!("PC/SC reader '{wanted}' not found"),
                None => "no PC/SC reader connected".to_string(),
            })
        })?;

        info!(reader = %reader.to_string_lossy(), "PC/SC reader opened");
        Ok(Self {
            context,
            reader,
            last_state: State::UNAWARE,
            card: None,
            current: None,
        })
    }

    fn connect(&mut self, atr: &[u8]) -> Result<RawTag> {
        let card = self
            .context
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)?;

        let uid = Uid::new(&transmit(&card, &APDU_GET_UID)?)?;
        let tag_type = tag_type_from_atr(atr);
        let tag = RawTag::new(uid, 0, tag_type.nominal_sak()).with_tag_type(tag_type);

        debug!(uid = %tag.uid, tag_type = %tag_type, "card connected");
        self.card = Some(card);
        Ok(tag)
    }

    /// Disconnect and keep reporting the tag until the reader state changes.
    fn halt(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                debug!(error = %e, "disconnect failed");
            }
        }
    }

    fn read_unit(
        card: &Card,
        layout: &MemoryLayout,
        unit: u16,
        authenticated: &mut Option<u16>,
    ) -> Result<Vec<u8>> {
        let block = u8::try_from(unit)
            .map_err(|_| HardwareError::invalid_data(format!("address {unit} out of range")))?;

        if layout.kind() == crate::layout::UnitKind::Block {
            let sector = layout.sector_start(unit);
            if *authenticated != Some(sector) {
                transmit(
                    card,
                    &[0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, block, KEY_TYPE_A, KEY_SLOT],
                )?;
                *authenticated = Some(sector);
            }
        }

        let length = layout.unit_size() as u8;
        let data = transmit(card, &[0xFF, 0xB0, 0x00, block, length])?;
        if data.len() < layout.unit_size() {
            return Err(HardwareError::communication(format!(
                "short read at {unit}: {} bytes",
                data.len()
            )));
        }
        Ok(data[..layout.unit_size()].to_vec())
    }
}

/// Send an APDU and strip the `90 00` status word.
fn transmit(card: &Card, apdu: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
    let response = card.transmit(apdu, &mut buffer)?;
    split_status(response)
}

fn split_status(response: &[u8]) -> Result<Vec<u8>> {
    match response {
        [data @ .., sw1, sw2] if [*sw1, *sw2] == SW_SUCCESS => Ok(data.to_vec()),
        [.., sw1, sw2] => Err(HardwareError::card_read(format!(
            "status word {sw1:02X}{sw2:02X}"
        ))),
        _ => Err(HardwareError::communication("APDU response without status word")),
    }
}

/// Reader state to wait on after a status change.
///
/// A card that is present but could not be connected is forgotten, so the
/// next poll sees it again and retries instead of timing out as absent.
fn committed_state(observed: State, connected: bool) -> State {
    if observed.contains(State::PRESENT) && !connected {
        State::UNAWARE
    } else {
        observed
    }
}

/// Bound for the blocking status wait.
///
/// The wait runs on the caller's task, so it is capped to keep a
/// single-threaded runtime responsive.
fn status_wait(timeout: Duration) -> Duration {
    timeout.min(MAX_STATUS_WAIT)
}

/// Card type from the card name bytes of a PC/SC part 3 ATR.
fn tag_type_from_atr(atr: &[u8]) -> TagType {
    if atr.get(7..12) != Some(&PART3_RID[..]) {
        return TagType::Iso14443_4;
    }
    match atr.get(13..15) {
        Some([0x00, 0x01]) => TagType::MifareClassic1K,
        Some([0x00, 0x02]) => TagType::MifareClassic4K,
        Some([0x00, 0x03]) => TagType::MifareUltralight,
        Some([0x00, 0x26]) => TagType::MifareMini,
        _ => TagType::Unknown(0xFF),
    }
}

impl TagReader for PcscReader {
    async fn poll(&mut self, timeout: Duration) -> Result<PresenceResult> {
        let mut states = [ReaderState::new(self.reader.clone(), self.last_state)];

        match self.context.get_status_change(status_wait(timeout), &mut states) {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => {
                return Ok(match &self.current {
                    Some(tag) => PresenceResult::Present(tag.clone()),
                    None => PresenceResult::Absent,
                });
            }
            Err(pcsc::Error::ReaderUnavailable | pcsc::Error::UnknownReader) => {
                return Err(HardwareError::disconnected(
                    self.reader.to_string_lossy().into_owned(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let state = &states[0];
        let mut event_state = state.event_state();
        event_state.remove(State::CHANGED);

        // Any state change ends the halted hold
        self.card = None;
        self.current = None;

        if !event_state.contains(State::PRESENT) {
            self.last_state = committed_state(event_state, false);
            return Ok(PresenceResult::Absent);
        }

        let atr = state.atr().to_vec();
        match self.connect(&atr) {
            Ok(tag) => {
                self.last_state = committed_state(event_state, true);
                self.current = Some(tag.clone());
                Ok(PresenceResult::Present(tag))
            }
            Err(e) => {
                self.last_state = committed_state(event_state, false);
                Err(e)
            }
        }
    }

    async fn read_ndef(&mut self, tag: &RawTag) -> Result<NdefMessage> {
        Err(HardwareError::unsupported(format!(
            "read_ndef on {} through PC/SC",
            tag.tag_type
        )))
    }

    async fn read_sectors(&mut self, tag: &RawTag, range: PageRange) -> Result<SectorData> {
        let layout = MemoryLayout::for_tag(tag.tag_type).ok_or_else(|| {
            HardwareError::unsupported(format!("read_sectors on {}", tag.tag_type))
        })?;
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| HardwareError::card_read("card is halted"))?;

        if layout.kind() == crate::layout::UnitKind::Block {
            let mut load_key = vec![0xFF, 0x82, 0x00, KEY_SLOT, 0x06];
            load_key.extend_from_slice(&TRANSPORT_KEY);
            transmit(card, &load_key)?;
        }

        let mut data = SectorData::new();
        let mut authenticated = None;
        for unit in layout.units(range) {
            match Self::read_unit(card, &layout, unit, &mut authenticated) {
                Ok(bytes) => data.push_unit(&bytes),
                Err(e) => {
                    warn!(unit, uid = %tag.uid, error = %e, "sector read aborted");
                    data.mark_partial(unit, e.to_string());
                    break;
                }
            }
        }

        // A read that got nothing keeps the card connected for a retry
        if data.units_read() > 0 {
            self.halt();
        }
        Ok(data)
    }

    fn read_strategy(&self) -> ReadStrategy {
        ReadStrategy::Sectors
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        Ok(ReaderInfo::new(
            self.reader.to_string_lossy().into_owned(),
            vec!["ISO14443A".to_string()],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn part3_atr(name: [u8; 2]) -> Vec<u8> {
        let mut atr = vec![0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C];
        atr.extend_from_slice(&PART3_RID);
        atr.extend_from_slice(&[0x03, name[0], name[1], 0x00, 0x00, 0x00, 0x00, 0x6A]);
        atr
    }

    #[rstest]
    #[case([0x00, 0x01], TagType::MifareClassic1K)]
    #[case([0x00, 0x02], TagType::MifareClassic4K)]
    #[case([0x00, 0x03], TagType::MifareUltralight)]
    #[case([0x00, 0x26], TagType::MifareMini)]
    #[case([0xF0, 0x04], TagType::Unknown(0xFF))]
    fn test_tag_type_from_atr(#[case] name: [u8; 2], #[case] expected: TagType) {
        assert_eq!(tag_type_from_atr(&part3_atr(name)), expected);
    }

    #[test]
    fn test_non_storage_atr() {
        let atr = [0x3B, 0x80, 0x80, 0x01, 0x01];
        assert_eq!(tag_type_from_atr(&atr), TagType::Iso14443_4);
    }

    #[test]
    fn test_failed_connect_forgets_present_state() {
        let present = State::PRESENT | State::INUSE;
        assert_eq!(committed_state(present, false), State::UNAWARE);
        assert_eq!(committed_state(present, true), present);
    }

    #[test]
    fn test_empty_state_is_kept() {
        assert_eq!(committed_state(State::EMPTY, false), State::EMPTY);
    }

    #[rstest]
    #[case(5, 5)]
    #[case(50, 50)]
    #[case(1000, 50)]
    fn test_status_wait_is_capped(#[case] timeout_ms: u64, #[case] expected_ms: u64) {
        assert_eq!(
            status_wait(Duration::from_millis(timeout_ms)),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn test_split_status() {
        assert_eq!(split_status(&[0x04, 0xAB, 0x90, 0x00]).unwrap(), vec![0x04, 0xAB]);
        assert!(matches!(
            split_status(&[0x63, 0x00]),
            Err(HardwareError::CardReadError { .. })
        ));
        assert!(matches!(
            split_status(&[0x90]),
            Err(HardwareError::CommunicationError { .. })
        ));
    }
}
