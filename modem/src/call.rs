use crate::at::AtExecutor;
use crate::error::{DialError, HangupError, ValidationError};
use derive_more::Display;
use serde::Serialize;
use tracing::{info, warn};

/// Call progress reported by the module.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    #[display("connected")]
    Connected,
    #[display("hung up")]
    Hangup,
    #[display("busy")]
    Busy,
    #[display("no answer")]
    NoAnswer,
    #[display("no carrier")]
    NoCarrier,
    #[display("error")]
    Error,
}

impl CallStatus {
    /// Statuses after which the module has dropped the call.
    pub fn ends_call(self) -> bool {
        matches!(
            self,
            Self::Hangup | Self::Busy | Self::NoAnswer | Self::NoCarrier
        )
    }
}

/// Where a call is in its lifecycle.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallPhase {
    #[default]
    Idle,
    Dialing,
    #[display("ended ({_0})")]
    Ended(CallStatus),
    Connected,
    #[display("failed")]
    Failed,
}

impl CallPhase {
    pub fn dial_accepted(self) -> Self {
        Self::Dialing
    }

    /// Applies a monitor status. `Error` is reported but only fails a call that
    /// has not connected yet.
    pub fn on_status(self, status: CallStatus) -> Self {
        match (self, status) {
            (Self::Idle, _) => Self::Idle,
            (_, s) if s.ends_call() => Self::Ended(s),
            (_, CallStatus::Connected) => Self::Connected,
            (Self::Dialing, CallStatus::Error) => Self::Failed,
            (phase, _) => phase,
        }
    }

    /// The monitor stopped without reporting how the call ended, which only
    /// happens when it was cancelled by a local hangup.
    pub fn monitor_stopped(self) -> Self {
        if self.is_active() {
            Self::Ended(CallStatus::Hangup)
        } else {
            self
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Dialing | Self::Connected)
    }
}

/// Trims the number and strips dashes and spaces.
pub fn sanitize_number(number: &str) -> Result<String, ValidationError> {
    let sanitized: String = number
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect();

    if sanitized.is_empty() {
        return Err(ValidationError::EmptyNumber);
    }

    Ok(sanitized)
}

/// Splits a comma separated list of numbers, dropping empty entries.
pub fn parse_phone_numbers(numbers: &str) -> Vec<String> {
    numbers
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Issues the dial and hangup commands.
#[derive(Clone)]
pub struct CallController {
    at: AtExecutor,
}

impl CallController {
    pub fn new(at: AtExecutor) -> Self {
        Self { at }
    }

    /// Dials `number` as a voice call and returns the sanitized number.
    ///
    /// Success only means the module accepted the dial; whether the call
    /// connects is reported by the call monitor.
    pub async fn dial(&self, number: &str) -> Result<String, DialError> {
        let number = sanitize_number(number)?;
        let response = self.at.send_command(&format!("ATD{number};")).await?;

        if response.contains("OK") || response.contains("CONNECT") {
            info!(number, "dial accepted");
            return Ok(number);
        }

        warn!(number, response = response.trim_end(), "dial rejected");
        Err(DialError::Rejected { response })
    }

    pub async fn hangup(&self) -> Result<(), HangupError> {
        let response = self.at.send_command("ATH").await?;

        if !response.contains("OK") {
            return Err(HangupError::Rejected { response });
        }

        info!("call hung up");
        Ok(())
    }
}
