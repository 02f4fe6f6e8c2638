use async_trait::async_trait;
use domain::DomainError;
use domain::driver::{ScaleConnectionConfig, ScaleDriver, ScaleLink, ScaleReader, ScaleWriter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_min_grams")]
    pub min_grams: f64,
    #[serde(default = "default_max_grams")]
    pub max_grams: f64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_min_grams() -> f64 {
    0.0
}
fn default_max_grams() -> f64 {
    500.0
}
fn default_interval_ms() -> u64 {
    200
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_grams: default_min_grams(),
            max_grams: default_max_grams(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Scale stand-in that streams fixed-format frames following a slow sine wave.
pub struct SimulatorDriver {
    config: SimulatorConfig,
}

impl SimulatorDriver {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScaleDriver for SimulatorDriver {
    async fn open(&self, config: &ScaleConnectionConfig) -> Result<ScaleLink, DomainError> {
        config.validate()?;
        tracing::info!(port = %config.device_path, "Simulator connected with config: {:?}", self.config);
        let now = Instant::now();
        Ok(ScaleLink::new(
            Box::new(SimulatedReader {
                config: self.config.clone(),
                start_time: now,
                next_frame_at: now + Duration::from_millis(self.config.interval_ms),
            }),
            Box::new(SimulatedWriter),
        ))
    }

    fn driver_type(&self) -> &str {
        "Simulator"
    }
}

struct SimulatedReader {
    config: SimulatorConfig,
    start_time: Instant,
    next_frame_at: Instant,
}

impl SimulatedReader {
    fn frame_at(&self, elapsed_secs: f64) -> String {
        let range = self.config.max_grams - self.config.min_grams;
        let midpoint = self.config.min_grams + range / 2.0;
        let amplitude = range / 2.0;

        // Period 10 seconds; settled near the crests where the slope flattens
        let phase = elapsed_secs * 0.1 * 2.0 * std::f64::consts::PI;
        let grams = midpoint + amplitude * phase.sin();
        let status = if phase.cos().abs() < 0.2 { 'S' } else { 'I' };
        format_fixed_frame(grams, status)
    }
}

/// Renders `grams` the way the scale does: `+000085.9 G S`.
pub fn format_fixed_frame(grams: f64, status: char) -> String {
    let sign = if grams < 0.0 { '-' } else { '+' };
    format!("{}{:08.1} G {}\r\n", sign, grams.abs().min(999_999.9), status)
}

#[async_trait]
impl ScaleReader for SimulatedReader {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, DomainError> {
        sleep_until(self.next_frame_at).await;
        self.next_frame_at += Duration::from_millis(self.config.interval_ms.max(1));

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let frame = self.frame_at(elapsed);
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame.as_bytes()[..n]);
        Ok(n)
    }
}

struct SimulatedWriter;

#[async_trait]
impl ScaleWriter for SimulatedWriter {
    async fn write_command(&mut self, command: &[u8]) -> Result<(), DomainError> {
        tracing::trace!(command = ?String::from_utf8_lossy(command), "Simulator received command");
        Ok(())
    }

    async fn shutdown(&mut self) {
        tracing::info!("Simulator disconnected");
    }
}
