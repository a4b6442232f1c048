//! Request/response exchange of a single AT command.

use crate::error::TransportError;
use crate::transport::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, warn};

/// The transport, shared between the command path and the call monitor.
/// Holding the lock is what makes an exchange atomic.
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

pub fn shared(transport: impl Transport) -> SharedTransport {
    Arc::new(Mutex::new(Box::new(transport)))
}

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_LINES: usize = 10;
pub const DEFAULT_LINE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Pause between writing a command and reading its reply.
    pub settle_delay: Duration,
    /// Upper bound on lines collected for one reply.
    pub max_lines: usize,
    pub line_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_lines: DEFAULT_MAX_LINES,
            line_timeout: DEFAULT_LINE_TIMEOUT,
        }
    }
}

/// True for a line that ends a module reply.
pub fn is_final_line(line: &str) -> bool {
    line.contains("OK") || line.contains("ERROR")
}

#[derive(Clone)]
pub struct AtExecutor {
    transport: SharedTransport,
    config: ExecutorConfig,
    connected: Arc<AtomicBool>,
}

impl AtExecutor {
    pub fn new(transport: SharedTransport, config: ExecutorConfig) -> Self {
        Self {
            transport,
            config,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// False once the link was closed or found dead. Commands are refused from
    /// then on.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Sends `command` and returns the raw reply, one line per `\n`.
    ///
    /// Reading stops at the first line containing `OK` or `ERROR`, after
    /// `max_lines` lines, or when a line read times out. The last two cases
    /// still succeed with whatever was collected.
    pub async fn send_command(&self, command: &str) -> Result<String, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.exchange(command).await.inspect_err(|e| {
            if e.is_fatal() {
                warn!("serial link lost: {e}");
                self.mark_disconnected();
            }
        })
    }

    async fn exchange(&self, command: &str) -> Result<String, TransportError> {
        debug!("Sending AT command: {}", command);
        let mut transport = self.transport.lock().await;

        transport.flush().await?;
        transport.write(format!("{command}\r\n").as_bytes()).await?;
        time::sleep(self.config.settle_delay).await;

        let mut response = String::new();
        for _ in 0..self.config.max_lines {
            match transport.read_line(self.config.line_timeout).await {
                Ok(line) => {
                    response.push_str(&line);
                    response.push('\n');
                    if is_final_line(&line) {
                        break;
                    }
                }
                Err(TransportError::Timeout) => {
                    debug!(command, "no final line before timeout");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if response.contains("ERROR") {
            warn!("AT command returned error: {}", response.trim_end());
        } else {
            debug!("AT command response: {}", response.trim_end());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn executor() -> (AtExecutor, crate::transport::MemoryTransportHandle) {
        let (transport, handle) = MemoryTransport::new();
        (
            AtExecutor::new(shared(transport), ExecutorConfig::default()),
            handle,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_ok() {
        let (at, modem) = executor();
        modem.reply_to("AT+CSQ", ["+CSQ: 23,99", "OK", "+CREG: 0,1"]);

        let response = at.send_command("AT+CSQ").await.unwrap();

        assert_eq!(response, "+CSQ: 23,99\nOK\n");
        assert_eq!(modem.written(), vec!["AT+CSQ"]);
    }

    #[tokio::test(start_paused = true)]
    async fn error_line_is_final_and_not_a_failure() {
        let (at, modem) = executor();
        modem.reply_to("AT+COPS?", ["+CME ERROR: 10"]);

        let response = at.send_command("AT+COPS?").await.unwrap();

        assert_eq!(response, "+CME ERROR: 10\n");
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_stale_input_before_writing() {
        let (at, modem) = executor();
        modem.push_line("NO CARRIER");
        modem.reply_to("AT", ["OK"]);

        let response = at.send_command("AT").await.unwrap();

        assert_eq!(response, "OK\n");
        assert_eq!(modem.flush_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn line_budget_caps_reply_without_sentinel() {
        let (at, modem) = executor();
        modem.reply_to("AT+QENG", (0..25).map(|i| format!("line {i}")));

        let response = at.send_command("AT+QENG").await.unwrap();

        assert_eq!(response.lines().count(), DEFAULT_MAX_LINES);
        assert!(response.starts_with("line 0\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_returns_partial_reply() {
        let (at, modem) = executor();
        modem.reply_to("ATI", ["Quectel"]);

        let response = at.send_command("ATI").await.unwrap();

        assert_eq!(response, "Quectel\n");
    }

    #[tokio::test(start_paused = true)]
    async fn waits_settle_delay_before_reading() {
        let (at, modem) = executor();
        modem.reply_to("AT", ["OK"]);
        let start = time::Instant::now();

        at.send_command("AT").await.unwrap();

        assert!(start.elapsed() >= DEFAULT_SETTLE_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_commands_do_not_interleave() {
        let (at, modem) = executor();
        modem.reply_to("AT+CGMR", ["EC600NCNLCR03A01M08", "Revision: 2", "OK"]);
        modem.reply_to("AT+CSQ", ["+CSQ: 18,99", "OK"]);

        let first = tokio::spawn({
            let at = at.clone();
            async move { at.send_command("AT+CGMR").await }
        });
        time::sleep(Duration::from_millis(10)).await;
        let second = tokio::spawn({
            let at = at.clone();
            async move { at.send_command("AT+CSQ").await }
        });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(first, "EC600NCNLCR03A01M08\nRevision: 2\nOK\n");
        assert_eq!(second, "+CSQ: 18,99\nOK\n");
        assert_eq!(modem.written(), vec!["AT+CGMR", "AT+CSQ"]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_is_surfaced() {
        let (at, modem) = executor();
        modem.close_stream();

        let err = at.send_command("AT").await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(!at.is_connected());

        let err = at.send_command("AT").await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_executor_does_not_touch_the_port() {
        let (at, modem) = executor();
        at.mark_disconnected();

        let err = at.send_command("AT").await.unwrap_err();

        assert!(matches!(err, TransportError::NotConnected));
        assert!(modem.written().is_empty());
    }
}
