//! Outbound side of the bridge.
//!
//! A [`Transport`] takes finished events and hands them to whatever carries
//! them off the device: a message broker client, a log line, a channel in
//! tests. Delivery failures are reported back but never retried here.

#![allow(async_fn_in_trait)]

use crate::error::{Result, ScannerError};
use crate::event::TagEvent;
use serde_json::Value;
use tokio::sync::mpsc;

/// Publish hook for tag events.
pub trait Transport: Send {
    /// Publish one event. Ownership of the event moves to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError::Transport`] if the event could not be handed
    /// off.
    async fn publish(&mut self, event: TagEvent) -> Result<()>;

    /// Advertise the configuration schema, once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError::Transport`] if the schema could not be handed
    /// off.
    async fn advertise_config_schema(&mut self, schema: &Value) -> Result<()> {
        let _ = schema;
        Ok(())
    }
}

/// Transport feeding a Tokio channel.
///
/// # Examples
///
/// ```
/// use tagbridge_scanner::transport::ChannelTransport;
///
/// let (transport, mut events) = ChannelTransport::new(16);
/// # drop(transport);
/// # assert!(events.try_recv().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<TagEvent>,
    schema: Option<Value>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TagEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, schema: None }, rx)
    }

    /// Schema received through [`Transport::advertise_config_schema`].
    pub fn advertised_schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }
}

impl Transport for ChannelTransport {
    async fn publish(&mut self, event: TagEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ScannerError::transport("event channel closed"))
    }

    async fn advertise_config_schema(&mut self, schema: &Value) -> Result<()> {
        self.schema = Some(schema.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{TagContents, encode};
    use tagbridge_core::Uid;
    use tagbridge_hardware::RawTag;

    fn event() -> TagEvent {
        let tag = RawTag::new(Uid::new(&[1, 2, 3, 4]).unwrap(), 0x0004, 0x08);
        encode(&tag, TagContents::Unrecognized)
    }

    #[tokio::test]
    async fn test_publish_delivers_event() {
        let (mut transport, mut rx) = ChannelTransport::new(4);
        transport.publish(event()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), event());
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped() {
        let (mut transport, rx) = ChannelTransport::new(4);
        drop(rx);
        assert!(matches!(
            transport.publish(event()).await,
            Err(ScannerError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_schema_is_recorded() {
        let (mut transport, _rx) = ChannelTransport::new(4);
        let schema = tagbridge_core::CONFIG_SCHEMA.to_json();
        transport.advertise_config_schema(&schema).await.unwrap();
        assert_eq!(transport.advertised_schema(), Some(&schema));
    }
}
