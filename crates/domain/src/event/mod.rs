use chrono::Utc;
use serde::{Deserialize, Serialize};

mod publisher;
pub use publisher::EventPublisher;

/// A weight sample ready for subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWeightEvent {
    #[serde(rename = "kg")]
    pub net_kg: f64,
    #[serde(rename = "grossKg")]
    pub gross_kg: f64,
    pub stable: bool,
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
}

impl NetWeightEvent {
    pub fn new(net_kg: f64, gross_kg: f64, stable: bool) -> Self {
        Self {
            net_kg,
            gross_kg,
            stable,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Everything the scale subsystem broadcasts. Field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScaleEvent {
    Weight(NetWeightEvent),
    Status {
        connected: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ScaleEvent {
    pub fn weight(net_kg: f64, gross_kg: f64, stable: bool) -> Self {
        Self::Weight(NetWeightEvent::new(net_kg, gross_kg, stable))
    }

    pub fn connected(port: impl Into<String>) -> Self {
        Self::Status {
            connected: true,
            port: Some(port.into()),
        }
    }

    pub fn disconnected() -> Self {
        Self::Status {
            connected: false,
            port: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Weight(_) => "weight",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
        }
    }
}
