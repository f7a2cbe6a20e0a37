//! JSON-lines transport.

use serde_json::{Value, json};
use tagbridge_scanner::{Result, ScannerError, TagEvent, Transport};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct LineTransport<W> {
    writer: W,
}

/// Events on standard output, logs stay on standard error.
pub type StdoutTransport = LineTransport<Stdout>;

impl StdoutTransport {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> LineTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_line(&mut self, mut line: String) -> Result<()> {
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin + Send> Transport for LineTransport<W> {
    async fn publish(&mut self, event: TagEvent) -> Result<()> {
        let line = event
            .to_json()
            .map_err(|e| ScannerError::transport(e.to_string()))?;
        self.write_line(line).await
    }

    async fn advertise_config_schema(&mut self, schema: &Value) -> Result<()> {
        self.write_line(json!({ "configSchema": schema }).to_string())
            .await
    }
}
