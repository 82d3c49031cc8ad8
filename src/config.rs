//! Daemon configuration.
//!
//! Loaded from `config.toml` under the platform config directory
//! (`~/.config/wrowfusion/` on Linux); every key is optional and falls back
//! to a sensible default, so a missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::s4::rower::RowerOptions;
use crate::state::aggregator::{MetricSources, PaceSource, PowerSource};

/// Errors loading or parsing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Serial link settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Explicit device path, e.g. `/dev/ttyACM0`. Discovered by USB
    /// descriptor when unset.
    pub port: Option<String>,
    /// Pause inserted every 10 high-frequency requests, in milliseconds.
    /// Zero disables it.
    pub high_freq_pause_ms: u64,
}

/// Power derivation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub source: PowerSource,
}

/// Pace derivation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaceConfig {
    pub source: PaceSource,
}

/// Analog heartbeat output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    /// BCM pin number wired to the monitor's 3.5 mm HR jack.
    pub gpio_pin: u8,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        HeartbeatConfig {
            enabled: true,
            gpio_pin: 18,
        }
    }
}

/// External heart-rate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HrConfig {
    /// Readings older than this count as absent.
    pub timeout_secs: u64,
}

impl Default for HrConfig {
    fn default() -> Self {
        HrConfig { timeout_secs: 10 }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub power: PowerConfig,
    pub pace: PaceConfig,
    pub heartbeat: HeartbeatConfig,
    pub hr: HrConfig,
}

impl Config {
    /// The platform path of the config file.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "wrowfusion")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the configuration from the platform path, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Config, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                tracing::debug!("no config file; using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Load the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        tracing::info!(path = %path.display(), "loading configuration");
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn metric_sources(&self) -> MetricSources {
        MetricSources {
            power: self.power.source,
            pace: self.pace.source,
        }
    }

    pub fn rower_options(&self) -> RowerOptions {
        RowerOptions {
            port: self.serial.port.clone(),
            high_freq_pause: Duration::from_millis(self.serial.high_freq_pause_ms),
        }
    }

    pub fn hr_timeout(&self) -> Duration {
        Duration::from_secs(self.hr.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.serial.port, None);
        assert_eq!(config.power.source, PowerSource::RollingAverage);
        assert_eq!(config.pace.source, PaceSource::Monitor);
        assert!(config.heartbeat.enabled);
        assert_eq!(config.heartbeat.gpio_pin, 18);
        assert_eq!(config.hr_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [serial]
            port = "/dev/ttyACM0"
            high_freq_pause_ms = 100

            [power]
            source = "concept2"

            [pace]
            source = "derived"

            [heartbeat]
            enabled = false
            gpio_pin = 23
            "#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.rower_options().high_freq_pause, Duration::from_millis(100));
        assert_eq!(config.power.source, PowerSource::Concept2);
        assert_eq!(config.pace.source, PaceSource::Derived);
        assert!(!config.heartbeat.enabled);
        assert_eq!(config.heartbeat.gpio_pin, 23);
        // Unspecified sections keep their defaults
        assert_eq!(config.hr.timeout_secs, 10);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[power]\nsource = \"concept2\"").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.power.source, PowerSource::Concept2);
        assert_eq!(config.pace.source, PaceSource::Monitor);
        assert!(config.heartbeat.enabled);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not toml at all [").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
