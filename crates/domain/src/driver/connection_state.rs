use serde::{Deserialize, Serialize};

/// Lifecycle of the single scale connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "reason")]
pub enum ConnectionState {
    /// No handle, no attempt in flight
    #[default]
    Disconnected,
    /// Physical open in progress
    Connecting,
    /// Handle open, read path and poll loop running
    Open,
    /// Close requested, handle being released
    Closing,
    /// Open failed or the link died mid-session
    Faulted(String),
}

impl ConnectionState {
    /// Check if state allows a new open attempt
    pub fn can_open(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Faulted(_))
    }

    /// Check if the link is usable
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn fault_reason(&self) -> Option<&str> {
        match self {
            Self::Faulted(reason) => Some(reason),
            _ => None,
        }
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        if self.can_open() {
            Ok(Self::Connecting)
        } else {
            Err("Can only connect from Disconnected or Faulted state")
        }
    }

    /// Transition to open state
    pub fn to_open(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Open),
            _ => Err("Can only complete an open from Connecting state"),
        }
    }

    /// Transition to closing state
    pub fn to_closing(&self) -> Result<Self, &'static str> {
        match self {
            Self::Open => Ok(Self::Closing),
            _ => Err("Can only close from Open state"),
        }
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    /// Transition to faulted state
    pub fn to_faulted(&self, reason: impl Into<String>) -> Result<Self, &'static str> {
        match self {
            Self::Connecting | Self::Open => Ok(Self::Faulted(reason.into())),
            _ => Err("Can only fault from Connecting or Open state"),
        }
    }
}
