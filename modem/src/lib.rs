//! Driver for cellular modules spoken to with AT commands over a serial line.
//!
//! Start with [`Modem::connect`]. Everything underneath it ([`at`],
//! [`parser`], [`call`], [`monitor`], [`status`]) is usable on its own over
//! any [`transport::Transport`].

pub mod at;
pub mod call;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod parser;
pub mod status;
pub mod transport;

mod modem;

pub use call::{CallPhase, CallStatus};
pub use error::{
    DialError, HangupError, ModemError, NotifyError, ParseError, TransportError,
    ValidationError,
};
pub use modem::{DEFAULT_BAUD_RATE, Modem, ModemConfig};
pub use monitor::CallSession;
pub use notify::{LogSink, NotificationSink};
pub use parser::{RegistrationState, SimState};
pub use status::NetworkStatus;
