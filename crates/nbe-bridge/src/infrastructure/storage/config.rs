//! TOML-based configuration for the bridge.
//!
//! The bridge reads one file (default `nbe-bridge.toml`, override with
//! `--config` or `NBE_BRIDGE_CONFIG`).  A missing file is not an error: the
//! defaults below are used, which point at a controller on localhost.
//!
//! ```toml
//! log_level = "info"
//!
//! [device]
//! address = "192.168.1.50:8483"
//! serial = "123456"
//! pin_code = "0123456789"
//!
//! [transport]
//! timeout_ms = 1000
//! max_attempts = 3
//!
//! [monitor]
//! settings_categories = ["boiler", "hot_water"]
//! settings_interval_secs = 60
//! operating_interval_secs = 10
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a file only needs the
//! entries that differ from the defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nbe_core::protocol::messages::{DEFAULT_PORT, PIN_CODE_LEN};
use nbe_core::{AppId, ControllerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::TransportConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but cannot be used.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub transport: NetworkConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Which controller to talk to and how to identify ourselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// `host:port` of the controller.
    #[serde(default = "default_address")]
    pub address: String,
    /// Controller serial number (at most 6 characters).
    #[serde(default)]
    pub serial: String,
    /// Pin code printed on the controller (at most 10 characters).
    #[serde(default)]
    pub pin_code: String,
    /// Identifier sent in every request header (at most 12 characters).
    #[serde(default = "default_app_id")]
    pub app_id: String,
}

/// Timing of request retries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// How long to wait for each response before retransmitting.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total transmissions per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Which monitors to run and how often they poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Settings categories, each polled with `category.*`.
    #[serde(default = "default_settings_categories")]
    pub settings_categories: Vec<String>,
    #[serde(default = "default_settings_interval_secs")]
    pub settings_interval_secs: u64,
    /// 0 disables the operating-data monitor.
    #[serde(default = "default_operating_interval_secs")]
    pub operating_interval_secs: u64,
    /// 0 disables the advanced-data monitor.
    #[serde(default = "default_advanced_interval_secs")]
    pub advanced_interval_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_address() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}
fn default_app_id() -> String {
    "nbe-bridge".to_string()
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_settings_categories() -> Vec<String> {
    ["boiler", "hot_water", "regulation", "oxygen", "hopper"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_settings_interval_secs() -> u64 {
    60
}
fn default_operating_interval_secs() -> u64 {
    10
}
fn default_advanced_interval_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            device: DeviceConfig::default(),
            transport: NetworkConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            serial: String::new(),
            pin_code: String::new(),
            app_id: default_app_id(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settings_categories: default_settings_categories(),
            settings_interval_secs: default_settings_interval_secs(),
            operating_interval_secs: default_operating_interval_secs(),
            advanced_interval_secs: default_advanced_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Validates the device section and builds transport settings from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparseable address, an
    /// identifier that does not fit its header field, an over-long pin code,
    /// or a zero `max_attempts`.
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let device_addr: SocketAddr =
            self.device
                .address
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    field: "device.address",
                    reason: e.to_string(),
                })?;
        let controller_id =
            ControllerId::new(&self.device.serial).map_err(|e| ConfigError::Invalid {
                field: "device.serial",
                reason: e.to_string(),
            })?;
        let app_id = AppId::new(&self.device.app_id).map_err(|e| ConfigError::Invalid {
            field: "device.app_id",
            reason: e.to_string(),
        })?;
        if self.device.pin_code.len() > PIN_CODE_LEN || !self.device.pin_code.is_ascii() {
            return Err(ConfigError::Invalid {
                field: "device.pin_code",
                reason: format!("must be at most {PIN_CODE_LEN} ASCII characters"),
            });
        }
        if self.transport.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "transport.max_attempts",
                reason: "must be at least 1".into(),
            });
        }

        Ok(TransportConfig {
            device_addr,
            app_id,
            controller_id,
            pin_code: self.device.pin_code.clone(),
            timeout: Duration::from_millis(self.transport.timeout_ms),
            max_attempts: self.transport.max_attempts,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.device.address = "192.168.1.50:8483".into();
        cfg.device.serial = "123456".into();
        cfg.device.pin_code = "0123456789".into();
        cfg
    }

    #[test]
    fn test_app_config_default_targets_local_device_port() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.device.address, "127.0.0.1:8483");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.transport.max_attempts, 3);
        assert!(cfg.monitor.settings_categories.contains(&"boiler".to_string()));
    }

    #[test]
    fn test_partial_toml_fills_missing_fields_with_defaults() {
        // Arrange
        let text = r#"
            [device]
            serial = "ABC123"

            [monitor]
            settings_categories = ["boiler"]
        "#;

        // Act
        let cfg: AppConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.device.serial, "ABC123");
        assert_eq!(cfg.device.app_id, "nbe-bridge");
        assert_eq!(cfg.monitor.settings_categories, vec!["boiler"]);
        assert_eq!(cfg.monitor.operating_interval_secs, 10);
        assert_eq!(cfg.transport.timeout_ms, 1000);
    }

    #[test]
    fn test_app_config_serializes_and_deserializes_round_trip() {
        let mut cfg = valid_config();
        cfg.transport.timeout_ms = 250;

        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_transport_config_converts_units() {
        let transport = valid_config().transport_config().unwrap();

        assert_eq!(transport.device_addr.port(), 8483);
        assert_eq!(transport.controller_id.as_str(), "123456");
        assert_eq!(transport.timeout, Duration::from_millis(1000));
        assert_eq!(transport.pin_code, "0123456789");
    }

    #[test]
    fn test_transport_config_rejects_bad_address() {
        let mut cfg = valid_config();
        cfg.device.address = "boiler.local".into();

        let err = cfg.transport_config().unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { field: "device.address", .. }));
    }

    #[test]
    fn test_transport_config_rejects_long_serial_and_pin() {
        let mut long_serial = valid_config();
        long_serial.device.serial = "1234567".into();
        let mut long_pin = valid_config();
        long_pin.device.pin_code = "01234567890".into();

        assert!(matches!(
            long_serial.transport_config(),
            Err(ConfigError::Invalid { field: "device.serial", .. })
        ));
        assert!(matches!(
            long_pin.transport_config(),
            Err(ConfigError::Invalid { field: "device.pin_code", .. })
        ));
    }

    #[test]
    fn test_transport_config_rejects_zero_attempts() {
        let mut cfg = valid_config();
        cfg.transport.max_attempts = 0;

        assert!(matches!(
            cfg.transport_config(),
            Err(ConfigError::Invalid { field: "transport.max_attempts", .. })
        ));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips_through_disk() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nbe-bridge.toml");
        let cfg = valid_config();

        // Act
        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[device\naddress = ").unwrap();

        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
    }
}
