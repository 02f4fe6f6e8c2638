//! Application layer - Scale session use cases

pub mod scale;

pub use scale::{ScaleSession, SubscriberBroadcast};
