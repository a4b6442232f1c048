use crate::at::{AtExecutor, ExecutorConfig, shared};
use crate::call::CallController;
use crate::error::{DialError, HangupError, ModemError};
use crate::monitor::{CallMonitor, CallSession};
use crate::notify::NotificationSink;
use crate::status::{NetworkStatus, StatusReporter, format_report};
use crate::transport::{SerialTransport, Transport};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone)]
pub struct ModemConfig {
    pub serial_port: PathBuf,
    pub baud_rate: u32,
    pub executor: ExecutorConfig,
}

impl ModemConfig {
    pub fn new(serial_port: impl Into<PathBuf>) -> Self {
        Self {
            serial_port: serial_port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Driver for one cellular module: calls, hangups and status checks over a
/// single serial link.
pub struct Modem {
    at: AtExecutor,
    calls: CallController,
    status: StatusReporter,
    sink: Arc<dyn NotificationSink>,
    active_call: Mutex<Option<CancellationToken>>,
}

impl Modem {
    /// Opens the serial port and checks that the module answers `AT`.
    pub async fn connect(
        config: &ModemConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, ModemError> {
        info!("Initializing modem on {}", config.serial_port.display());
        let transport = SerialTransport::open(&config.serial_port, config.baud_rate)?;

        Self::with_transport(transport, config.executor, sink).await
    }

    /// Like [`Modem::connect`], over an already open transport.
    pub async fn with_transport(
        transport: impl Transport,
        executor: ExecutorConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, ModemError> {
        let at = AtExecutor::new(shared(transport), executor);
        let modem = Self {
            calls: CallController::new(at.clone()),
            status: StatusReporter::new(at.clone()),
            at,
            sink,
            active_call: Mutex::new(None),
        };

        let response = modem.at.send_command("AT").await?;
        if !response.contains("OK") {
            modem.at.mark_disconnected();
            return Err(ModemError::Probe { response });
        }

        info!("modem initialized");
        Ok(modem)
    }

    pub fn is_connected(&self) -> bool {
        self.at.is_connected()
    }

    /// Whether a call placed with [`Modem::make_call_with_monitor`] is still
    /// being watched.
    pub fn call_active(&self) -> bool {
        self.active_call()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Dials without watching call progress.
    pub async fn make_call(&self, number: &str) -> Result<(), DialError> {
        self.calls.dial(number).await.map(|_| ())
    }

    /// Dials and starts a monitor for the call's progress.
    pub async fn make_call_with_monitor(
        &self,
        number: &str,
    ) -> Result<CallSession, DialError> {
        let number = self.calls.dial(number).await?;
        let cancel = CancellationToken::new();

        if let Some(previous) = self.active_call().replace(cancel.clone()) {
            warn!("replacing the monitor of a previous call");
            previous.cancel();
        }

        let monitor = CallMonitor::for_executor(&self.at);
        Ok(CallSession::start(number, monitor, cancel))
    }

    /// Stops the active call monitor, if any, then hangs up.
    pub async fn hangup_call(&self) -> Result<(), HangupError> {
        if let Some(cancel) = self.active_call().take() {
            cancel.cancel();
        }

        self.calls.hangup().await
    }

    /// Collects a fresh snapshot. Unreadable fields are left empty.
    pub async fn check_network_status(&self) -> NetworkStatus {
        if !self.is_connected() {
            warn!("modem not connected, skipping status queries");
            return NetworkStatus::empty();
        }

        self.status.check_status().await
    }

    /// Checks the network and sends the report to the notification sink.
    ///
    /// The snapshot is returned so callers can act on an abnormal status.
    pub async fn start_network_monitoring(&self) -> Result<NetworkStatus, ModemError> {
        let status = self.check_network_status().await;

        if !status.is_normal() {
            warn!(?status, "network status abnormal");
        }

        if let Err(e) = self.sink.send(&format_report(&status)).await {
            error!("failed to send network status report: {e}");
            return Err(e.into());
        }

        Ok(status)
    }

    /// Stops any call monitor and releases the serial port.
    pub async fn close(&self) -> Result<(), ModemError> {
        if let Some(cancel) = self.active_call().take() {
            cancel.cancel();
        }

        self.at.mark_disconnected();
        self.at.transport().lock().await.close().await?;
        info!("modem closed");

        Ok(())
    }

    fn active_call(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
