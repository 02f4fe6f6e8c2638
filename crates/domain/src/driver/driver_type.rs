use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of link used to reach the scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DriverType {
    #[default]
    RS232,
    Simulator,
}

impl DriverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS232 => "RS232",
            Self::Simulator => "Simulator",
        }
    }
}

impl FromStr for DriverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rs232" | "serial" => Ok(Self::RS232),
            "simulator" | "sim" => Ok(Self::Simulator),
            other => Err(format!("Unknown driver type: {}", other)),
        }
    }
}
