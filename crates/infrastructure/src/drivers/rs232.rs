use std::time::Duration;

use async_trait::async_trait;
use domain::DomainError;
use domain::driver::{
    Parity, ScaleConnectionConfig, ScaleDriver, ScaleLink, ScaleReader, ScaleWriter,
    normalize_port_path,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt};

fn to_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

fn to_stop_bits(stop_bits: u8) -> Result<tokio_serial::StopBits, DomainError> {
    match stop_bits {
        1 => Ok(tokio_serial::StopBits::One),
        2 => Ok(tokio_serial::StopBits::Two),
        _ => Err(DomainError::InvalidConfig(format!(
            "Invalid stop bits: {}",
            stop_bits
        ))),
    }
}

fn to_data_bits(data_bits: u8) -> Result<tokio_serial::DataBits, DomainError> {
    match data_bits {
        5 => Ok(tokio_serial::DataBits::Five),
        6 => Ok(tokio_serial::DataBits::Six),
        7 => Ok(tokio_serial::DataBits::Seven),
        8 => Ok(tokio_serial::DataBits::Eight),
        _ => Err(DomainError::InvalidConfig(format!(
            "Invalid data bits: {}",
            data_bits
        ))),
    }
}

/// Opens real serial ports through tokio-serial.
pub struct RS232Driver {
    timeout: Duration,
}

impl Default for RS232Driver {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
        }
    }
}

impl RS232Driver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScaleDriver for RS232Driver {
    async fn open(&self, config: &ScaleConnectionConfig) -> Result<ScaleLink, DomainError> {
        config.validate()?;
        let port_name = normalize_port_path(&config.device_path);

        tracing::debug!(
            port = %port_name,
            baud_rate = config.baud_rate,
            "Opening serial port"
        );

        let mut port = tokio_serial::new(&port_name, config.baud_rate)
            .data_bits(to_data_bits(config.data_bits)?)
            .parity(to_parity(config.parity))
            .stop_bits(to_stop_bits(config.stop_bits)?)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.timeout)
            .open_native_async()
            .map_err(|e| {
                tracing::warn!(port = %port_name, error = %e, "Failed to open serial port");
                DomainError::OpenFailed {
                    path: port_name.clone(),
                    reason: format!(
                        "{}. Tip: Ensure the port is not used by another application and that you have sufficient permissions.",
                        e
                    ),
                }
            })?;

        // Many scales only start streaming once the control lines are asserted
        if let Err(e) = port.write_data_terminal_ready(true) {
            tracing::debug!(port = %port_name, error = %e, "DTR not supported");
        }
        if let Err(e) = port.write_request_to_send(true) {
            tracing::debug!(port = %port_name, error = %e, "RTS not supported");
        }

        tracing::debug!(port = %port_name, "Serial port opened successfully");

        let (reader, writer) = tokio::io::split(port);
        Ok(ScaleLink::new(
            Box::new(SerialReader { inner: reader }),
            Box::new(SerialWriter {
                inner: writer,
                port_name,
            }),
        ))
    }

    fn driver_type(&self) -> &str {
        "RS232"
    }
}

struct SerialReader<R> {
    inner: R,
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ScaleReader for SerialReader<R> {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, DomainError> {
        self.inner
            .read(buf)
            .await
            .map_err(|e| DomainError::Transport(format!("Read error: {}", e)))
    }
}

struct SerialWriter<W> {
    inner: W,
    port_name: String,
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ScaleWriter for SerialWriter<W> {
    async fn write_command(&mut self, command: &[u8]) -> Result<(), DomainError> {
        self.inner
            .write_all(command)
            .await
            .map_err(|e| DomainError::Transport(format!("Write error: {}", e)))?;
        self.inner
            .flush()
            .await
            .map_err(|e| DomainError::Transport(format!("Flush error: {}", e)))
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.inner.shutdown().await {
            tracing::warn!(port = %self.port_name, error = %e, "Error shutting down serial port");
        }
        tracing::info!(port = %self.port_name, "Serial port closed");
    }
}
