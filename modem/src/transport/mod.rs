//! Byte-level access to the module.
//!
//! [`Transport`] is the seam between the AT protocol code and the physical
//! serial port, so tests and the simulator can swap in a [`MemoryTransport`].

use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

mod memory;
mod serial;

pub use memory::{MemoryTransport, MemoryTransportHandle};
pub use serial::SerialTransport;

/// Line-oriented duplex link to a modem.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Discards everything received but not yet read.
    async fn flush(&mut self) -> Result<(), TransportError>;

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads the next non-empty line without its terminator.
    ///
    /// Returns [`TransportError::Timeout`] if no complete line arrives within
    /// `timeout`. Bytes of a partially received line are retained for the next
    /// call, so dropping the future mid-read loses nothing.
    async fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

static CLAIMED_PORTS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Process-wide exclusive claim on a device path. Released on drop.
#[derive(Debug)]
pub struct PortClaim {
    path: PathBuf,
}

impl PortClaim {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        let mut claimed = CLAIMED_PORTS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !claimed.insert(path.clone()) {
            return Err(TransportError::AlreadyOpen(path));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PortClaim {
    fn drop(&mut self) {
        let mut claimed = CLAIMED_PORTS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.remove(&self.path);
    }
}

/// Accumulates raw bytes and hands out complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pops the next non-empty line, with CR/LF stripped.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if !line.trim().is_empty() {
                return Some(line.to_owned());
            }
        }

        None
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}
