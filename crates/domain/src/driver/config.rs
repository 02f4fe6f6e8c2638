use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DomainError;

/// Lower bound for the poll cadence; faster requests flood slow scales.
pub const MIN_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial parameters for one session. Replaced wholesale on reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConnectionConfig {
    pub device_path: String,
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

impl ScaleConnectionConfig {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        clamp_poll_interval(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.device_path.trim().is_empty() {
            return Err(DomainError::InvalidConfig("Missing port path".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(DomainError::InvalidConfig(
                "Baud rate must be positive".to_string(),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(DomainError::InvalidConfig(format!(
                "Invalid data bits: {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(DomainError::InvalidConfig(format!(
                "Invalid stop bits: {}",
                self.stop_bits
            )));
        }
        Ok(())
    }
}

/// Applies the poll interval floor. Zero means "use the default".
pub fn clamp_poll_interval(interval_ms: u64) -> Duration {
    let ms = if interval_ms == 0 {
        DEFAULT_POLL_INTERVAL_MS
    } else {
        interval_ms.max(MIN_POLL_INTERVAL_MS)
    };
    Duration::from_millis(ms)
}
