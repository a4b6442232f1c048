use super::{LineBuffer, PortClaim, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{self, Instant};
use tokio_serial::{
    ClearBuffer, DataBits, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::{debug, info};

/// A modem reached over a tty device.
pub struct SerialTransport {
    port: Option<SerialStream>,
    lines: LineBuffer,
    claim: Option<PortClaim>,
}

impl SerialTransport {
    /// Opens `path` at `baud_rate`, 8N1.
    ///
    /// Fails with [`TransportError::AlreadyOpen`] if this process already holds
    /// the device.
    pub fn open(path: impl AsRef<Path>, baud_rate: u32) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let claim = PortClaim::acquire(path)?;

        let port = tokio_serial::new(path.to_string_lossy(), baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .open_native_async()
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), baud_rate, "opened serial port");

        Ok(Self {
            port: Some(port),
            lines: LineBuffer::default(),
            claim: Some(claim),
        })
    }

    fn port(&mut self) -> Result<&mut SerialStream, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn flush(&mut self) -> Result<(), TransportError> {
        self.lines.clear();
        self.port()?.clear(ClearBuffer::Input)?;

        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(bytes).await?;
        port.flush().await?;

        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(line);
            }

            let port = self.port()?;
            let n = match time::timeout_at(deadline, port.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => return Err(TransportError::Timeout),
            };

            if n == 0 {
                return Err(TransportError::Closed);
            }

            self.lines.extend(&chunk[..n]);
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut port) = self.port.take() {
            port.shutdown().await.ok();
        }

        if let Some(claim) = self.claim.take() {
            debug!(path = %claim.path().display(), "released serial port");
        }

        Ok(())
    }
}
