use thiserror::Error;

use crate::driver::PortInfo;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Port not found: {path}")]
    PortNotFound {
        path: String,
        available: Vec<PortInfo>,
    },

    #[error("Failed to enumerate serial ports: {0}")]
    PortEnumeration(String),

    #[error("Invalid connection configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Scale is not connected")]
    NotConnected,
}

impl DomainError {
    /// Ports that were enumerated when a lookup failed, empty for other errors.
    pub fn available_ports(&self) -> &[PortInfo] {
        match self {
            Self::PortNotFound { available, .. } => available,
            _ => &[],
        }
    }
}

/// A frame that matched no known wire format. Expected line noise, never surfaced to
/// subscribers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized frame: {0:?}")]
pub struct FrameRejected(pub String);
