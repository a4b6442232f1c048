//! Logging setup for the alert binaries.
//!
//! Under systemd, logs go to journald with the configured syslog identifier.
//! In a terminal, or when journald is unreachable, they go to stderr.
//! `RUST_LOG` overrides the default `info` level.

use std::io::{IsTerminal as _, Write as _};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

/// Where log records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Journald,
    Stderr,
}

/// Picks journald only when an identifier was given and stderr is not a tty.
pub fn select_output(syslog_identifier: Option<&str>, stderr_is_tty: bool) -> LogOutput {
    match syslog_identifier {
        Some(_) if !stderr_is_tty => LogOutput::Journald,
        _ => LogOutput::Stderr,
    }
}

#[derive(Debug)]
pub struct TelemetryConfig {
    syslog_identifier: Option<String>,
    global_filter: EnvFilter,
}

impl TelemetryConfig {
    #[expect(clippy::new_without_default, reason = "may add required args later")]
    #[must_use]
    pub fn new() -> Self {
        Self {
            syslog_identifier: None,
            global_filter: EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        }
    }

    /// Logs to journald under `syslog_identifier` unless running in a tty.
    #[must_use]
    pub fn with_journald(self, syslog_identifier: &str) -> Self {
        Self {
            syslog_identifier: Some(syslog_identifier.to_owned()),
            ..self
        }
    }

    #[must_use]
    pub fn with_global_filter(self, filter: EnvFilter) -> Self {
        Self {
            global_filter: filter,
            ..self
        }
    }

    pub fn try_init(
        self,
    ) -> Result<TelemetryFlusher, tracing_subscriber::util::TryInitError> {
        let output = select_output(
            self.syslog_identifier.as_deref(),
            std::io::stderr().is_terminal(),
        );

        let journald_layer = match (output, self.syslog_identifier) {
            (LogOutput::Journald, Some(identifier)) => tracing_journald::layer()
                .inspect_err(|err| {
                    eprintln!("failed connecting to journald, logging to stderr: {err}");
                })
                .map(|layer| layer.with_syslog_identifier(identifier))
                .ok(),
            _ => None,
        };
        let stderr_layer = journald_layer
            .is_none()
            .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(journald_layer)
            .with(self.global_filter)
            .try_init()?;

        Ok(TelemetryFlusher { _private: () })
    }

    /// Installs the global subscriber. Panics if one is already installed.
    pub fn init(self) -> TelemetryFlusher {
        self.try_init().expect("failed to initialize alert-telemetry")
    }
}

#[must_use = "call .flush at the end of the program, otherwise logs may get lost"]
pub struct TelemetryFlusher {
    _private: (),
}

impl TelemetryFlusher {
    pub async fn flush(self) {
        self.flush_blocking();
    }

    pub fn flush_blocking(self) {
        std::io::stderr().flush().ok();
        std::io::stdout().flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journald_only_outside_a_terminal() {
        assert_eq!(select_output(Some("alert-daemon"), false), LogOutput::Journald);
        assert_eq!(select_output(Some("alert-daemon"), true), LogOutput::Stderr);
        assert_eq!(select_output(None, false), LogOutput::Stderr);
    }
}
