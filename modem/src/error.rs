use std::path::PathBuf;
use thiserror::Error;

/// Failures of the serial link itself.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open serial port '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("serial port '{0}' is already open")]
    AlreadyOpen(PathBuf),

    #[error("serial port is not connected")]
    NotConnected,

    #[error("timed out waiting for a line from the module")]
    Timeout,

    #[error("serial stream closed")]
    Closed,

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(#[from] tokio_serial::Error),
}

impl TransportError {
    /// Whether the link is gone for good and the driver should be considered
    /// disconnected.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::NotConnected)
    }
}

/// A module reply that did not match the grammar expected for one field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse {field} from response: {response:?}")]
pub struct ParseError {
    pub field: &'static str,
    pub response: String,
}

impl ParseError {
    pub(crate) fn new(field: &'static str, response: &str) -> Self {
        Self {
            field,
            response: response.to_owned(),
        }
    }
}

/// Caller supplied input rejected before any serial traffic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("phone number is empty")]
    EmptyNumber,
}

#[derive(Error, Debug)]
pub enum DialError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to send dial command: {0}")]
    Transport(#[from] TransportError),

    #[error("module rejected dial, response: {response:?}")]
    Rejected { response: String },
}

#[derive(Error, Debug)]
pub enum HangupError {
    #[error("failed to send hangup command: {0}")]
    Transport(#[from] TransportError),

    #[error("module rejected hangup, response: {response:?}")]
    Rejected { response: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(String),

    #[error("notification endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors of the driver facade that are not tied to one call operation.
#[derive(Error, Debug)]
pub enum ModemError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("module did not answer the AT probe, response: {response:?}")]
    Probe { response: String },

    #[error("failed to deliver status report: {0}")]
    Notify(#[from] NotifyError),
}
