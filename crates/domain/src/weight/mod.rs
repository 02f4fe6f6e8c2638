mod reading;
mod stability;
mod zero_offset;

pub use reading::WeightReading;
pub use stability::{STABILITY_THRESHOLD_KG, StabilityClassifier};
pub use zero_offset::{NEAR_ZERO_KG, ZeroOffsetTracker, clamp_near_zero};
