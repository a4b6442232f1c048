//! Background scan of the serial stream for call-progress keywords.

use crate::at::{AtExecutor, SharedTransport};
use crate::call::{CallPhase, CallStatus};
use crate::error::TransportError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

pub const MONITOR_READ_TIMEOUT: Duration = Duration::from_millis(500);
pub const MONITOR_ERROR_BACKOFF: Duration = Duration::from_millis(100);
const EVENT_CAPACITY: usize = 8;

/// Keywords in match priority order, with whether they end the scan.
const KEYWORDS: [(&str, CallStatus, bool); 5] = [
    ("NO CARRIER", CallStatus::NoCarrier, true),
    ("BUSY", CallStatus::Busy, true),
    ("NO ANSWER", CallStatus::NoAnswer, true),
    ("CONNECT", CallStatus::Connected, false),
    ("ERROR", CallStatus::Error, false),
];

/// Classifies one line of modem output, case-insensitively.
///
/// Returns the status and whether the monitor stops after reporting it.
pub fn classify(line: &str) -> Option<(CallStatus, bool)> {
    let upper = line.to_uppercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _, _)| upper.contains(keyword))
        .map(|(_, status, terminal)| (*status, *terminal))
}

pub struct CallMonitor {
    transport: SharedTransport,
    read_timeout: Duration,
    link: Option<AtExecutor>,
}

impl CallMonitor {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            read_timeout: MONITOR_READ_TIMEOUT,
            link: None,
        }
    }

    /// Watches the transport of `at` and marks it disconnected when the link
    /// is lost mid-call.
    pub fn for_executor(at: &AtExecutor) -> Self {
        Self {
            link: Some(at.clone()),
            ..Self::new(at.transport().clone())
        }
    }

    pub fn with_read_timeout(self, read_timeout: Duration) -> Self {
        Self {
            read_timeout,
            ..self
        }
    }

    /// Starts scanning. The receiver yields statuses until a terminal one was
    /// sent or `cancel` fires, then closes.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<CallStatus>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let handle = task::spawn(self.run(cancel, tx));

        (rx, handle)
    }

    async fn run(self, cancel: CancellationToken, tx: mpsc::Sender<CallStatus>) {
        info!("starting call monitor");
        // leaves the token cancelled however the scan ends
        let _done = cancel.clone().drop_guard();

        loop {
            // The lock is taken per read so command exchanges can run between
            // reads but never interleave with one.
            let read = async {
                let mut transport = self.transport.lock().await;
                transport.read_line(self.read_timeout).await
            };

            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = read => line,
            };

            let line = match line {
                Ok(line) => line,
                Err(TransportError::Timeout) => continue,
                Err(e) => {
                    match &self.link {
                        Some(at) if e.is_fatal() && at.is_connected() => {
                            warn!("serial link lost during call: {e}");
                            at.mark_disconnected();
                        }
                        _ => debug!("call monitor read failed: {e}"),
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = time::sleep(MONITOR_ERROR_BACKOFF) => continue,
                    }
                }
            };

            let Some((status, terminal)) = classify(&line) else {
                continue;
            };

            if status == CallStatus::Error {
                warn!(line, "call reported error");
            } else {
                info!(line, %status, "call status changed");
            }

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(status) => sent,
            };

            if sent.is_err() || terminal {
                break;
            }
        }

        info!("call monitor stopped");
    }
}

/// A dialed call and the monitor watching it. Dropping the session stops the
/// monitor.
pub struct CallSession {
    number: String,
    phase: CallPhase,
    events: mpsc::Receiver<CallStatus>,
    task: JoinHandle<()>,
    _cancel_on_drop: DropGuard,
}

impl CallSession {
    pub(crate) fn start(
        number: String,
        monitor: CallMonitor,
        cancel: CancellationToken,
    ) -> Self {
        let (events, task) = monitor.spawn(cancel.clone());

        Self {
            number,
            phase: CallPhase::Idle.dial_accepted(),
            events,
            task,
            _cancel_on_drop: cancel.drop_guard(),
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    /// Next status from the monitor, or `None` once it stopped.
    pub async fn next_status(&mut self) -> Option<CallStatus> {
        let Some(status) = self.events.recv().await else {
            self.phase = self.phase.monitor_stopped();
            return None;
        };
        self.phase = self.phase.on_status(status);

        Some(status)
    }

    /// Stops the monitor and waits for it to exit.
    pub async fn cancel(self) {
        let Self {
            task,
            _cancel_on_drop: guard,
            ..
        } = self;
        drop(guard);

        if let Err(e) = task.await {
            warn!("call monitor task failed: {e}");
        }
    }
}
