//! Alert daemon: rings on-call numbers and reports modem network health.

pub mod calls;
pub mod config;
pub mod notifier;
pub mod scheduler;
pub mod simulate;

pub use calls::{CallOutcome, CallPlan, CallResult, place_calls};
pub use config::{Config, ConfigError};
pub use notifier::WebhookNotifier;
