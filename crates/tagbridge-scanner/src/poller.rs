//! Polling context and run loop.
//!
//! [`BridgeContext`] owns everything one bridge needs: the reader, the
//! transport, the debouncer and the poll configuration. A single task drives
//! it, so none of that state is shared or locked.
//!
//! Each tick polls the reader once. A new card is read with the reader's
//! strategy, encoded and published; a held card is ignored until it leaves
//! the field. Failures are logged and cost one tick, never the loop.
//!
//! # Examples
//!
//! ```
//! use tagbridge_core::Uid;
//! use tagbridge_hardware::mock::{MockTag, MockTagReader};
//! use tagbridge_scanner::poller::{BridgeContext, TickOutcome};
//! use tagbridge_scanner::transport::ChannelTransport;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (reader, field) = MockTagReader::new();
//!     let (transport, mut events) = ChannelTransport::new(8);
//!     let mut bridge = BridgeContext::builder(reader, transport).build();
//!
//!     let uid = Uid::new(&[0x04, 0xAB, 0x3C, 0x9F]).unwrap();
//!     field.present(MockTag::new(uid, 0x00)).await;
//!
//!     assert_eq!(bridge.tick().await, TickOutcome::Published);
//!     assert_eq!(bridge.tick().await, TickOutcome::Held);
//!
//!     let event = events.recv().await.unwrap();
//!     assert_eq!(event.uid().to_hex(), "04AB3C9F");
//! }
//! ```

use crate::debounce::{DebounceStats, TagDebouncer, Transition};
use crate::error::Result;
use crate::event::{self, TagContents};
use crate::transport::Transport;
use std::future::Future;
use std::time::Duration;
use tagbridge_core::{CONFIG_SCHEMA, ConfigChange, PollConfig, constants::DEFAULT_POLL_TIMEOUT_MS};
use tagbridge_hardware::{
    HardwareError, MemoryLayout, PageRange, PresenceResult, RawTag, ReadStrategy, TagReader,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Empty field, nothing held.
    NoTag,

    /// The held card is still there.
    Held,

    /// The held card left the field.
    Released,

    /// A new card was read and its event published.
    Published,

    /// The poll itself failed.
    PollFailed,

    /// A new card was seen but could not be read; it is retried next tick.
    ReadFailed,

    /// The event was built but the transport refused it.
    PublishFailed,
}

/// Counters of the run loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub ticks: u64,
    pub poll_failures: u64,
    pub read_failures: u64,
    pub published: u64,
    pub publish_failures: u64,
}

/// Single-owner state of one reader bridge.
#[derive(Debug)]
pub struct BridgeContext<R, T> {
    reader: R,
    transport: T,
    debouncer: TagDebouncer,
    config: PollConfig,
    poll_timeout: Duration,
    sector_range: Option<PageRange>,
    stats: BridgeStats,
}

impl<R: TagReader, T: Transport> BridgeContext<R, T> {
    /// Start building a context around a reader and a transport.
    pub fn builder(reader: R, transport: T) -> BridgeContextBuilder<R, T> {
        BridgeContextBuilder {
            reader,
            transport,
            config: PollConfig::default(),
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            sector_range: None,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn debouncer(&self) -> &TagDebouncer {
        &self.debouncer
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    pub fn debounce_stats(&self) -> DebounceStats {
        self.debouncer.stats()
    }

    /// Apply a remote configuration push.
    ///
    /// Takes effect from the next tick deadline. A rejected push keeps the
    /// previous configuration.
    ///
    /// # Errors
    ///
    /// Returns the configuration error if the push is malformed or a value
    /// is out of range.
    pub fn on_config_change(&mut self, push: &str) -> Result<Vec<ConfigChange>> {
        match self.config.apply_str(push) {
            Ok(changes) => {
                for change in &changes {
                    let ConfigChange::TagReadInterval { old, new } = change;
                    info!(
                        old_ms = old.as_millis() as u64,
                        new_ms = new.as_millis() as u64,
                        "tag read interval changed"
                    );
                }
                Ok(changes)
            }
            Err(e) => {
                warn!(error = %e, "config push rejected");
                Err(e.into())
            }
        }
    }

    /// Poll once and act on the result.
    pub async fn tick(&mut self) -> TickOutcome {
        self.stats.ticks += 1;

        let tag = match self.reader.poll(self.poll_timeout).await {
            Ok(PresenceResult::Present(tag)) => tag,
            Ok(PresenceResult::Absent) => {
                return match self.debouncer.apply(None) {
                    Transition::Release => {
                        debug!("tag left the field");
                        TickOutcome::Released
                    }
                    _ => TickOutcome::NoTag,
                };
            }
            Err(e) => {
                warn!(error = %e, "poll failed");
                self.stats.poll_failures += 1;
                return TickOutcome::PollFailed;
            }
        };

        if !self.debouncer.evaluate(Some(&tag.uid)).emits_event() {
            self.debouncer.apply(Some(&tag.uid));
            return TickOutcome::Held;
        }

        let contents = match self.read_contents(&tag).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(uid = %tag.uid, tag_type = %tag.tag_type, error = %e, "tag read failed");
                self.stats.read_failures += 1;
                return TickOutcome::ReadFailed;
            }
        };
        self.debouncer.apply(Some(&tag.uid));

        let event = event::encode(&tag, contents);
        info!(uid = %tag.uid, tag_type = %tag.tag_type, "tag presented");

        match self.transport.publish(event).await {
            Ok(()) => {
                self.stats.published += 1;
                TickOutcome::Published
            }
            Err(e) => {
                error!(uid = %tag.uid, error = %e, "publish failed");
                self.stats.publish_failures += 1;
                TickOutcome::PublishFailed
            }
        }
    }

    async fn read_contents(&mut self, tag: &RawTag) -> tagbridge_hardware::Result<TagContents> {
        let result = match self.reader.read_strategy() {
            ReadStrategy::Ndef => self.reader.read_ndef(tag).await.map(TagContents::Ndef),
            ReadStrategy::Sectors => {
                let range = self.sector_range.or_else(|| {
                    MemoryLayout::for_tag(tag.tag_type).map(|layout| layout.default_range())
                });
                match range {
                    Some(range) => self
                        .reader
                        .read_sectors(tag, range)
                        .await
                        .map(|data| TagContents::Sectors { sak: tag.sak, data }),
                    None => Ok(TagContents::Unrecognized),
                }
            }
        };

        match result {
            // Nothing read at all is a failed read, not an empty card
            Ok(TagContents::Sectors { data, .. }) if data.units_read() == 0 && data.is_partial() => {
                let reason = data
                    .partial()
                    .map(|partial| partial.reason.clone())
                    .unwrap_or_default();
                Err(HardwareError::communication(reason))
            }
            Err(e) if e.is_unsupported() => {
                debug!(tag_type = %tag.tag_type, "no reader support, publishing identification only");
                Ok(TagContents::Unrecognized)
            }
            other => other,
        }
    }

    /// Run until `shutdown` completes.
    ///
    /// Advertises the configuration schema, then ticks no more often than
    /// the configured interval. Configuration pushes arriving on `config_rx`
    /// are applied between ticks; a closed channel just stops pushes.
    /// Returns the context so callers can inspect it.
    pub async fn run<F>(mut self, mut config_rx: mpsc::Receiver<String>, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        if let Err(e) = self
            .transport
            .advertise_config_schema(&CONFIG_SCHEMA.to_json())
            .await
        {
            warn!(error = %e, "config schema advertisement failed");
        }

        match self.reader.get_reader_info().await {
            Ok(info) => info!(
                reader = %info.name,
                firmware = info.firmware_version.as_deref().unwrap_or("unknown"),
                "reader ready"
            ),
            Err(e) => warn!(error = %e, "reader info unavailable"),
        }
        info!(
            interval_ms = self.config.tag_read_interval_ms(),
            poll_timeout_ms = self.poll_timeout.as_millis() as u64,
            "polling started"
        );

        tokio::pin!(shutdown);
        let mut config_open = true;
        let mut last_tick = Instant::now();
        let mut next_tick = last_tick;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                push = config_rx.recv(), if config_open => match push {
                    Some(push) => {
                        if self.on_config_change(&push).is_ok() {
                            next_tick = last_tick + self.config.tag_read_interval();
                        }
                    }
                    None => {
                        debug!("config channel closed");
                        config_open = false;
                    }
                },
                _ = tokio::time::sleep_until(next_tick) => {
                    last_tick = Instant::now();
                    self.tick().await;
                    next_tick = last_tick + self.config.tag_read_interval();
                }
            }
        }

        self
    }
}

/// Builder for [`BridgeContext`].
#[derive(Debug)]
pub struct BridgeContextBuilder<R, T> {
    reader: R,
    transport: T,
    config: PollConfig,
    poll_timeout: Duration,
    sector_range: Option<PageRange>,
}

impl<R: TagReader, T: Transport> BridgeContextBuilder<R, T> {
    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Restrict sector dumps to `range`.
    pub fn with_sector_range(mut self, sector_range: Option<PageRange>) -> Self {
        self.sector_range = sector_range;
        self
    }

    pub fn build(self) -> BridgeContext<R, T> {
        BridgeContext {
            reader: self.reader,
            transport: self.transport,
            debouncer: TagDebouncer::new(),
            config: self.config,
            poll_timeout: self.poll_timeout,
            sector_range: self.sector_range,
            stats: BridgeStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBody;
    use crate::transport::ChannelTransport;
    use tagbridge_core::Uid;
    use tagbridge_hardware::mock::{MockTag, MockTagReader, MockTagReaderHandle};
    use tagbridge_ndef::{NdefMessage, NdefRecord};

    type TestBridge = BridgeContext<MockTagReader, ChannelTransport>;

    fn bridge(strategy: ReadStrategy) -> (TestBridge, MockTagReaderHandle, mpsc::Receiver<event::TagEvent>) {
        let (reader, handle) = MockTagReader::new();
        let (transport, events) = ChannelTransport::new(16);
        let bridge = BridgeContext::builder(reader.with_strategy(strategy), transport).build();
        (bridge, handle, events)
    }

    fn card(bytes: &[u8], sak: u8) -> MockTag {
        MockTag::new(Uid::new(bytes).unwrap(), sak)
    }

    #[tokio::test]
    async fn test_empty_field() {
        let (mut bridge, _handle, _events) = bridge(ReadStrategy::Ndef);
        assert_eq!(bridge.tick().await, TickOutcome::NoTag);
        assert_eq!(bridge.stats().ticks, 1);
    }

    #[tokio::test]
    async fn test_held_card_publishes_once() {
        let (mut bridge, handle, mut events) = bridge(ReadStrategy::Ndef);
        handle.present(card(&[0x04, 0xAB, 0x3C, 0x9F], 0x00)).await;

        assert_eq!(bridge.tick().await, TickOutcome::Published);
        for _ in 0..3 {
            assert_eq!(bridge.tick().await, TickOutcome::Held);
        }

        handle.remove().await;
        assert_eq!(bridge.tick().await, TickOutcome::Released);
        assert!(bridge.debouncer().is_idle());

        let event = events.recv().await.unwrap();
        assert_eq!(
            event.to_json().unwrap(),
            r#"{"uid":"04AB3C9F","type":"MIFARE_UL","records":[]}"#
        );
        assert!(events.try_recv().is_err());
        assert_eq!(bridge.debounce_stats().suppressed, 3);
    }

    #[tokio::test]
    async fn test_two_cards_in_sequence_publish_twice() {
        let (mut bridge, handle, mut events) = bridge(ReadStrategy::Ndef);

        handle.present(card(&[1, 2, 3, 4], 0x08)).await;
        bridge.tick().await;
        handle.present(card(&[5, 6, 7, 8], 0x08)).await;
        assert_eq!(bridge.tick().await, TickOutcome::Published);

        assert_eq!(events.recv().await.unwrap().uid().to_hex(), "01020304");
        assert_eq!(events.recv().await.unwrap().uid().to_hex(), "05060708");
    }

    #[tokio::test]
    async fn test_failed_read_is_retried() {
        let (mut bridge, handle, mut events) = bridge(ReadStrategy::Ndef);
        let message = NdefMessage::from_records(vec![NdefRecord::text("en", "hi")]);
        handle
            .present(card(&[0x12, 0x34], 0x00).with_ndef(&message))
            .await;
        handle.fail_next_ndef_reads(1).await;

        assert_eq!(bridge.tick().await, TickOutcome::ReadFailed);
        assert!(bridge.debouncer().is_idle());

        assert_eq!(bridge.tick().await, TickOutcome::Published);
        let value = events.recv().await.unwrap().to_value().unwrap();
        assert_eq!(value["records"][0]["payload"], "02656E6869");
        assert_eq!(value["records"][0]["payloadAscii"], ".enhi");
        assert_eq!(bridge.stats().read_failures, 1);
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_state() {
        let (mut bridge, handle, _events) = bridge(ReadStrategy::Ndef);
        handle.present(card(&[1, 2, 3, 4], 0x00)).await;
        bridge.tick().await;

        handle.fail_next_polls(1).await;
        assert_eq!(bridge.tick().await, TickOutcome::PollFailed);
        assert_eq!(bridge.debouncer().held(), Some(&[1, 2, 3, 4][..]));
        assert_eq!(bridge.tick().await, TickOutcome::Held);
    }

    #[tokio::test]
    async fn test_publish_failure_is_not_retried() {
        let (mut bridge, handle, events) = bridge(ReadStrategy::Ndef);
        drop(events);
        handle.present(card(&[1, 2, 3, 4], 0x00)).await;

        assert_eq!(bridge.tick().await, TickOutcome::PublishFailed);
        assert_eq!(bridge.tick().await, TickOutcome::Held);
        assert_eq!(bridge.stats().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_sector_strategy_publishes_data() {
        let (mut bridge, handle, mut events) = bridge(ReadStrategy::Sectors);
        let memory: Vec<u8> = (0..64u8).collect();
        handle
            .present(card(&[1, 2, 3, 4], 0x00).with_memory(memory))
            .await;

        assert_eq!(bridge.tick().await, TickOutcome::Published);
        let event = events.recv().await.unwrap();
        match event.body() {
            EventBody::Sectors { sak, data, partial } => {
                assert_eq!(sak, "00");
                assert_eq!(data.len(), 48 * 2);
                assert!(data.starts_with("10111213"));
                assert!(partial.is_none());
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sector_read_failing_on_first_unit_is_retried() {
        let (mut bridge, handle, _events) = bridge(ReadStrategy::Sectors);
        handle
            .present(card(&[1, 2, 3, 4], 0x08).fail_sector_read_at(4))
            .await;

        assert_eq!(bridge.tick().await, TickOutcome::ReadFailed);
        assert!(bridge.debouncer().is_idle());
    }

    #[tokio::test]
    async fn test_unsupported_card_publishes_identification() {
        let (mut bridge, handle, mut events) = bridge(ReadStrategy::Ndef);
        handle.present(card(&[0x08, 1, 2, 3], 0x20)).await;

        assert_eq!(bridge.tick().await, TickOutcome::Published);
        assert_eq!(
            events.recv().await.unwrap().to_json().unwrap(),
            r#"{"uid":"08010203","type":"ISO_14443_4"}"#
        );
    }

    #[tokio::test]
    async fn test_config_change() {
        let (mut bridge, _handle, _events) = bridge(ReadStrategy::Ndef);

        let changes = bridge.on_config_change(r#"{"tagReadIntervalMs": 500}"#).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(bridge.config().tag_read_interval_ms(), 500);

        assert!(bridge.on_config_change(r#"{"tagReadIntervalMs": 70000}"#).is_err());
        assert_eq!(bridge.config().tag_read_interval_ms(), 500);

        assert!(bridge.on_config_change(r#"{"somethingElse": true}"#).unwrap().is_empty());
    }
}
