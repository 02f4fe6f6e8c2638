use domain::DomainError;
use domain::driver::{PortCatalog, PortInfo};
use tokio_serial::{SerialPortInfo, SerialPortType};

/// Live OS enumeration. Every call re-queries the system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortCatalog;

impl SystemPortCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl PortCatalog for SystemPortCatalog {
    fn list(&self) -> Result<Vec<PortInfo>, DomainError> {
        let ports = tokio_serial::available_ports().map_err(|e| {
            tracing::warn!(error = %e, "Serial port enumeration failed");
            DomainError::PortEnumeration(e.to_string())
        })?;
        Ok(ports.into_iter().map(to_port_info).collect())
    }
}

fn to_port_info(port: SerialPortInfo) -> PortInfo {
    match port.port_type {
        SerialPortType::UsbPort(usb) => PortInfo {
            friendly_name: usb
                .product
                .map(|product| format!("{} ({})", product, port.port_name))
                .unwrap_or_else(|| port.port_name.clone()),
            manufacturer: usb.manufacturer,
            path: port.port_name,
        },
        SerialPortType::BluetoothPort => PortInfo {
            friendly_name: format!("{} (Bluetooth)", port.port_name),
            manufacturer: None,
            path: port.port_name,
        },
        SerialPortType::PciPort | SerialPortType::Unknown => PortInfo::new(port.port_name),
    }
}

/// Fixed port list, used with the simulator and in tests.
#[derive(Debug, Default, Clone)]
pub struct StaticPortCatalog {
    ports: Vec<PortInfo>,
}

impl StaticPortCatalog {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self { ports }
    }

    pub fn with_paths(paths: &[&str]) -> Self {
        Self::new(paths.iter().map(|p| PortInfo::new(*p)).collect())
    }
}

impl PortCatalog for StaticPortCatalog {
    fn list(&self) -> Result<Vec<PortInfo>, DomainError> {
        Ok(self.ports.clone())
    }
}
