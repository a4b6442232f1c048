use super::Transport;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

#[derive(Default)]
struct Shared {
    written: Mutex<Vec<String>>,
    replies: Mutex<HashMap<String, Vec<String>>>,
    flushes: AtomicUsize,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory stand-in for a serial modem.
///
/// Lines are fed through a [`MemoryTransportHandle`], either unsolicited
/// ([`MemoryTransportHandle::push_line`]) or as the canned reply to a command
/// ([`MemoryTransportHandle::reply_to`]). Canned replies are queued at write
/// time, after the executor's flush, like a real module answering.
pub struct MemoryTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
}

#[derive(Clone)]
pub struct MemoryTransportHandle {
    tx: mpsc::UnboundedSender<String>,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryTransportHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let handle = MemoryTransportHandle {
            tx: tx.clone(),
            shared: shared.clone(),
        };

        (Self { tx, rx, shared }, handle)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        Ok(())
    }
}

impl MemoryTransportHandle {
    /// Queues an unsolicited line, as if the module printed it.
    pub fn push_line(&self, line: impl Into<String>) {
        self.tx.send(line.into()).ok();
    }

    /// Registers the lines the module answers with whenever `command` is
    /// written. Replaces any previous reply for the same command.
    pub fn reply_to<I, S>(&self, command: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        lock(&self.shared.replies).insert(command.to_owned(), lines);
    }

    /// Commands written so far, without their CR-LF terminator.
    pub fn written(&self) -> Vec<String> {
        lock(&self.shared.written).clone()
    }

    pub fn flush_count(&self) -> usize {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    /// Makes every further operation fail with [`TransportError::Closed`].
    pub fn close_stream(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn flush(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.shared.flushes.fetch_add(1, Ordering::SeqCst);
        while self.rx.try_recv().is_ok() {}

        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        let command = String::from_utf8_lossy(bytes)
            .trim_end_matches(['\r', '\n'])
            .to_owned();

        let reply = lock(&self.shared.replies).get(&command).cloned();
        lock(&self.shared.written).push(command);

        for line in reply.into_iter().flatten() {
            self.tx.send(line).ok();
        }

        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError> {
        self.ensure_open()?;

        match time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
