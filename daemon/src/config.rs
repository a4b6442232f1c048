use alert_modem::{DEFAULT_BAUD_RATE, ModemConfig};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_CALL_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Daemon configuration, read from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub modem: ModemSection,
    pub webhook: WebhookSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModemSection {
    pub enabled: bool,
    pub serial_port: PathBuf,
    pub baud_rate: u32,
    /// Seconds each call is held before hanging up.
    pub call_duration: i64,
    /// Minutes between network checks.
    pub network_check_interval: i64,
}

impl Default for ModemSection {
    fn default() -> Self {
        Self {
            enabled: true,
            serial_port: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
            call_duration: 0,
            network_check_interval: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookSection {
    /// Empty means notifications are only logged.
    pub url: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        serde_yaml::from_reader(file).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn modem_config(&self) -> ModemConfig {
        ModemConfig {
            baud_rate: self.modem.baud_rate,
            ..ModemConfig::new(&self.modem.serial_port)
        }
    }

    pub fn call_duration(&self) -> Duration {
        match u64::try_from(self.modem.call_duration) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_CALL_DURATION,
        }
    }

    pub fn network_check_interval(&self) -> Duration {
        match u64::try_from(self.modem.network_check_interval) {
            Ok(minutes) if minutes > 0 => Duration::from_secs(minutes * 60),
            _ => {
                error!(
                    configured = self.modem.network_check_interval,
                    "invalid network check interval, using 10 minutes"
                );
                DEFAULT_CHECK_INTERVAL
            }
        }
    }
}
