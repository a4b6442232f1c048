//! Extraction of typed values from the replies to individual AT commands.
//!
//! Every function here is pure. A [`ParseError`] only means that one field
//! could not be read; callers assembling a status snapshot keep going.

use crate::error::ParseError;
use derive_more::Display;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const IMEI_LENGTH: usize = 15;

static CSQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+CSQ:\s*(\d+),(\d+)").expect("valid regex"));
static CREG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+CREG:\s*\d+,(\d+)").expect("valid regex"));
static COPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\+COPS:\s*\d+,\d+,"([^"]+)""#).expect("valid regex")
});

/// Network registration as reported by `AT+CREG?`.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    #[display("not registered")]
    Unregistered,
    #[display("registered, home network")]
    RegisteredHome,
    #[display("searching")]
    Searching,
    #[display("registration denied")]
    Denied,
    #[display("registered, roaming")]
    RegisteredRoaming,
    #[default]
    #[display("unknown")]
    Unknown,
}

impl RegistrationState {
    /// Maps the `<stat>` field of `+CREG`. Codes outside the table are
    /// [`RegistrationState::Unknown`], never an error.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Unregistered,
            1 => Self::RegisteredHome,
            2 => Self::Searching,
            3 => Self::Denied,
            5 => Self::RegisteredRoaming,
            _ => Self::Unknown,
        }
    }
}

/// SIM card state as reported by `AT+CPIN?`.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimState {
    #[display("ready")]
    Ready,
    #[display("PIN required")]
    NeedsPin,
    #[display("PUK required")]
    NeedsPuk,
    #[default]
    #[display("unknown")]
    Unknown,
}

/// Signal strength (RSSI, 0-31 or 99) from `+CSQ: <rssi>,<ber>`.
pub fn parse_signal_strength(response: &str) -> Result<u8, ParseError> {
    CSQ.captures(response)
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| ParseError::new("signal strength", response))
}

pub fn parse_registration(response: &str) -> Result<RegistrationState, ParseError> {
    let caps = CREG
        .captures(response)
        .ok_or_else(|| ParseError::new("registration state", response))?;

    // an overlong code is still a code we don't know
    Ok(caps[1]
        .parse()
        .map(RegistrationState::from_code)
        .unwrap_or(RegistrationState::Unknown))
}

pub fn parse_sim_state(response: &str) -> SimState {
    if response.contains("READY") {
        SimState::Ready
    } else if response.contains("SIM PIN") {
        SimState::NeedsPin
    } else if response.contains("SIM PUK") {
        SimState::NeedsPuk
    } else {
        SimState::Unknown
    }
}

/// Quoted operator name from `+COPS: <mode>,<format>,"<oper>"`.
pub fn parse_operator(response: &str) -> Result<String, ParseError> {
    COPS.captures(response)
        .map(|caps| caps[1].to_owned())
        .ok_or_else(|| ParseError::new("operator name", response))
}

/// First line of the `AT+CGSN` reply that is exactly fifteen decimal digits.
pub fn parse_imei(response: &str) -> Result<String, ParseError> {
    response
        .lines()
        .map(str::trim)
        .find(|line| {
            line.len() == IMEI_LENGTH && line.bytes().all(|b| b.is_ascii_digit())
        })
        .map(str::to_owned)
        .ok_or_else(|| ParseError::new("IMEI", response))
}
