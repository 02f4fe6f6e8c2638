use std::time::Instant;

/// One successfully parsed frame, normalized to kilograms.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightReading {
    gross_kg: f64,
    raw_frame: String,
    captured_at: Instant,
    reported_stable: Option<bool>,
}

impl WeightReading {
    pub fn new(gross_kg: f64, raw_frame: impl Into<String>) -> Self {
        Self {
            gross_kg,
            raw_frame: raw_frame.into(),
            captured_at: Instant::now(),
            reported_stable: None,
        }
    }

    /// Attaches the stability flag the device sent on the wire.
    pub fn with_reported_stability(mut self, stable: bool) -> Self {
        self.reported_stable = Some(stable);
        self
    }

    pub fn gross_kg(&self) -> f64 {
        self.gross_kg
    }

    pub fn raw_frame(&self) -> &str {
        &self.raw_frame
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// `None` when the wire format carries no status letter.
    pub fn reported_stable(&self) -> Option<bool> {
        self.reported_stable
    }
}
