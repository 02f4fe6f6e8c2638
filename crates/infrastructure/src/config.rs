use config::{Config, ConfigError, Environment, File};
use domain::driver::{DEFAULT_POLL_INTERVAL_MS, DriverType, Parity, ScaleConnectionConfig};
use serde::{Deserialize, Serialize};

use crate::drivers::SimulatorConfig;
use crate::pipeline::FrameFormatKind;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_port() -> u16 {
    3000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScaleSettings {
    #[serde(default)]
    pub driver: DriverType,
    /// Device opened at startup when `auto_connect` is set
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub legacy_seven_digit: bool,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    2
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self {
            driver: DriverType::default(),
            port: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            poll_interval_ms: default_poll_interval_ms(),
            legacy_seven_digit: false,
            auto_connect: false,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl ScaleSettings {
    /// Serial parameters for opening `device_path`.
    pub fn connection_for(&self, device_path: impl Into<String>) -> ScaleConnectionConfig {
        ScaleConnectionConfig {
            device_path: device_path.into(),
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    pub fn frame_formats(&self) -> Vec<FrameFormatKind> {
        let mut formats = vec![FrameFormatKind::Fixed, FrameFormatKind::LooseFallback];
        if self.legacy_seven_digit {
            formats.push(FrameFormatKind::LegacySevenDigit);
        }
        formats
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SubscriberConfig {
    /// Per-subscriber queue depth; events beyond it are dropped for that subscriber
    #[serde(default = "default_subscriber_buffer")]
    pub buffer: usize,
}

fn default_subscriber_buffer() -> usize {
    64
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            buffer: default_subscriber_buffer(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub scale: ScaleSettings,
    #[serde(default)]
    pub subscribers: SubscriberConfig,
}

impl ServerConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Local config file, e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Per-environment overrides
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. SCALE__SCALE__PORT=COM3)
            .add_source(
                Environment::with_prefix("SCALE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
