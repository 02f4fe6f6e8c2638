use serde::Serialize;

/// Net magnitudes below this snap to exactly zero.
pub const NEAR_ZERO_KG: f64 = 0.0005;

/// Session-scoped tare state. Never reset automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ZeroOffsetTracker {
    offset_kg: f64,
    last_gross_kg: Option<f64>,
}

impl ZeroOffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the most recent gross reading, the value a later `tare` captures.
    pub fn observe(&mut self, gross_kg: f64) {
        self.last_gross_kg = Some(gross_kg);
    }

    /// Sets the offset to the latest gross reading (0 when none was seen) and returns it.
    pub fn tare(&mut self) -> f64 {
        self.offset_kg = self.last_gross_kg.unwrap_or(0.0);
        self.offset_kg
    }

    pub fn clear_tare(&mut self) -> f64 {
        self.offset_kg = 0.0;
        self.offset_kg
    }

    pub fn offset_kg(&self) -> f64 {
        self.offset_kg
    }

    pub fn last_gross_kg(&self) -> Option<f64> {
        self.last_gross_kg
    }

    pub fn to_net(&self, gross_kg: f64) -> f64 {
        clamp_near_zero(gross_kg - self.offset_kg)
    }
}

pub fn clamp_near_zero(value_kg: f64) -> f64 {
    if value_kg.abs() < NEAR_ZERO_KG {
        0.0
    } else {
        value_kg
    }
}
