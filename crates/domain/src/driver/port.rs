use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One entry of the OS serial device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub path: String,
    pub manufacturer: Option<String>,
    pub friendly_name: String,
}

impl PortInfo {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            friendly_name: path.clone(),
            path,
            manufacturer: None,
        }
    }
}

/// Source of currently attached serial devices. Implementations must not cache.
#[cfg_attr(test, mockall::automock)]
pub trait PortCatalog: Send + Sync {
    fn list(&self) -> Result<Vec<PortInfo>, DomainError>;
}

/// Looks `path` up in a fresh enumeration, failing with the current port list attached.
pub fn resolve_port(catalog: &dyn PortCatalog, path: &str) -> Result<PortInfo, DomainError> {
    let available = catalog.list()?;
    match available.iter().find(|p| p.path == path) {
        Some(port) => Ok(port.clone()),
        None => Err(DomainError::PortNotFound {
            path: path.to_string(),
            available,
        }),
    }
}

/// Rewrites `path` for the transport open call on the current platform.
pub fn normalize_port_path(path: &str) -> String {
    normalize_port_path_for(path, cfg!(target_os = "windows"))
}

/// Windows only accepts `COM10` and above through the device namespace (`\\.\COM10`).
pub fn normalize_port_path_for(path: &str, windows: bool) -> String {
    if windows && com_port_number(path).is_some_and(|n| n >= 10) {
        format!(r"\\.\{}", path)
    } else {
        path.to_string()
    }
}

fn com_port_number(path: &str) -> Option<u32> {
    let prefix = path.get(..3)?;
    if !prefix.eq_ignore_ascii_case("COM") {
        return None;
    }
    let digits = &path[3..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
