use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::imaging::DEFAULT_MAX_WIDTH;
use crate::serial::SerialConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionSettings {
    /// Pause after opening before trusting the transport's state
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Bound on waiting for the request handler to stop
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default = "default_handler_poll_ms")]
    pub handler_poll_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    500
}
fn default_shutdown_timeout_ms() -> u64 {
    1000
}
fn default_handler_poll_ms() -> u64 {
    50
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            handler_poll_ms: default_handler_poll_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorSettings {
    #[serde(default = "default_monitor_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub enable_on_start: bool,
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_monitor_interval_ms(),
            enable_on_start: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Connect to `serial.port` at startup
    #[serde(default)]
    pub auto_connect: bool,
    /// Use an in-memory printer instead of a real port
    #[serde(default)]
    pub simulate: bool,
    #[serde(default = "default_image_max_width")]
    pub image_max_width: u32,
    /// Printer text encoding: UTF-8, EUC-KR, BIG5, GB2312 or Shift_JIS
    #[serde(default = "default_text_encoding")]
    pub text_encoding: String,
}

fn default_image_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_text_encoding() -> String {
    "UTF-8".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            connection: ConnectionSettings::default(),
            monitor: MonitorSettings::default(),
            auto_connect: false,
            simulate: false,
            image_max_width: default_image_max_width(),
            text_encoding: default_text_encoding(),
        }
    }
}

impl BridgeConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("serial.baud_rate", 9600)?
            .set_default("monitor.interval_ms", 1000)?
            // Local config file - e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Run-mode overrides - e.g. config/production.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. PRINTER_BRIDGE__SERIAL__BAUD_RATE=19200)
            .add_source(
                Environment::with_prefix("PRINTER_BRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.connection.settle_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.shutdown_timeout_ms)
    }

    pub fn handler_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connection.handler_poll_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.interval_ms)
    }
}
