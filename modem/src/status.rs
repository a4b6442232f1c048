//! Network status snapshots and their health verdict.

use crate::at::AtExecutor;
use crate::error::ParseError;
use crate::parser::{self, RegistrationState, SimState};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, warn};

/// Signal strengths at or below this are abnormal.
pub const MIN_SIGNAL_STRENGTH: u8 = 5;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What the module reported at one point in time. Fields that could not be
/// read keep their default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStatus {
    /// RSSI on the 0-31 scale, 99 when the module doesn't know.
    pub signal_strength: u8,
    pub registration: RegistrationState,
    pub sim: SimState,
    pub operator_name: String,
    pub imei: String,
    pub timestamp: DateTime<Local>,
}

impl NetworkStatus {
    /// An empty snapshot taken now.
    pub fn empty() -> Self {
        Self {
            signal_strength: 0,
            registration: RegistrationState::default(),
            sim: SimState::default(),
            operator_name: String::new(),
            imei: String::new(),
            timestamp: Local::now(),
        }
    }

    pub fn is_normal(&self) -> bool {
        self.signal_strength > MIN_SIGNAL_STRENGTH
            && self.registration == RegistrationState::RegisteredHome
            && self.sim == SimState::Ready
    }
}

/// Human readable report, as sent to the notification sink.
pub fn format_report(status: &NetworkStatus) -> String {
    let verdict = if status.is_normal() { "normal" } else { "abnormal" };

    format!(
        "Modem network status report\n\
         Status: {verdict}\n\
         Signal strength: {}\n\
         Registration: {}\n\
         SIM: {}\n\
         Operator: {}\n\
         IMEI: {}\n\
         Time: {}",
        status.signal_strength,
        status.registration,
        status.sim,
        status.operator_name,
        status.imei,
        status.timestamp.format(TIMESTAMP_FORMAT),
    )
}

/// Queries the module field by field.
#[derive(Clone)]
pub struct StatusReporter {
    at: AtExecutor,
}

impl StatusReporter {
    pub fn new(at: AtExecutor) -> Self {
        Self { at }
    }

    /// Never fails; each field is best effort.
    pub async fn check_status(&self) -> NetworkStatus {
        let mut status = NetworkStatus::empty();

        status.signal_strength =
            self.field("AT+CSQ", parser::parse_signal_strength).await;
        status.registration = self.field("AT+CREG?", parser::parse_registration).await;
        status.sim = self
            .field("AT+CPIN?", |r| Ok(parser::parse_sim_state(r)))
            .await;
        status.operator_name = self.field("AT+COPS?", parser::parse_operator).await;
        status.imei = self.field("AT+CGSN", parser::parse_imei).await;

        debug!(?status, "network status collected");
        status
    }

    async fn field<T, F>(&self, command: &str, parse: F) -> T
    where
        T: Default,
        F: FnOnce(&str) -> Result<T, ParseError>,
    {
        let response = match self.at.send_command(command).await {
            Ok(response) => response,
            Err(e) => {
                warn!(command, "failed to query module: {e}");
                return T::default();
            }
        };

        parse(&response)
            .inspect_err(|e| debug!("{e}"))
            .unwrap_or_default()
    }
}
