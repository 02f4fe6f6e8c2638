//! Infrastructure layer - Serial transport, wire parsing and configuration

pub mod config;
pub mod drivers;
pub mod framing;
pub mod pipeline;

pub use config::ServerConfig;
pub use drivers::DriverFactory;
pub use framing::FrameBuffer;
pub use pipeline::{FrameFormat, FrameFormatKind, WeightFrameParser};
