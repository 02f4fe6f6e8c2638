//! Domain layer - Pure scale rules with no I/O
//!
//! This crate contains:
//! - Connection lifecycle state and serial parameters
//! - Transport and port catalog seams (traits)
//! - Weight readings, tare and stability rules
//! - Broadcast events
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Testable in isolation

pub mod driver;
pub mod error;
pub mod event;
pub mod weight;

// Re-export commonly used types
pub use error::{DomainError, FrameRejected};
pub use event::{NetWeightEvent, ScaleEvent};
pub use weight::{StabilityClassifier, WeightReading, ZeroOffsetTracker};
