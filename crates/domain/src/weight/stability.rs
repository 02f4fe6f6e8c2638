/// Consecutive gross readings closer than this count as settled.
pub const STABILITY_THRESHOLD_KG: f64 = 0.001;

/// Host-side motion detector for frames that carry no status letter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityClassifier {
    threshold_kg: f64,
}

impl Default for StabilityClassifier {
    fn default() -> Self {
        Self {
            threshold_kg: STABILITY_THRESHOLD_KG,
        }
    }
}

impl StabilityClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, previous_gross_kg: f64, current_gross_kg: f64) -> bool {
        (current_gross_kg - previous_gross_kg).abs() < self.threshold_kg
    }

    /// Combines both signals. The device's own status wins; without a previous reading the
    /// comparator has nothing to compare and reports motion.
    pub fn resolve(
        &self,
        reported: Option<bool>,
        previous_gross_kg: Option<f64>,
        current_gross_kg: f64,
    ) -> bool {
        match (reported, previous_gross_kg) {
            (Some(stable), _) => stable,
            (None, Some(previous)) => self.classify(previous, current_gross_kg),
            (None, None) => false,
        }
    }
}
