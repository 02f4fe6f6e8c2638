use async_trait::async_trait;

use super::config::ScaleConnectionConfig;
use crate::error::DomainError;

/// Inbound half of an open link.
#[async_trait]
pub trait ScaleReader: Send {
    /// Waits for the next chunk of bytes. `Ok(0)` means the device side closed.
    ///
    /// Must be cancel safe: dropping the future before it resolves loses no bytes.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, DomainError>;
}

/// Outbound half of an open link. Exactly one owner writes at a time.
#[async_trait]
pub trait ScaleWriter: Send {
    async fn write_command(&mut self, command: &[u8]) -> Result<(), DomainError>;

    /// Releases the handle. Errors are logged by the implementation.
    async fn shutdown(&mut self);
}

/// A physically opened connection, split so reads and writes never contend.
pub struct ScaleLink {
    pub reader: Box<dyn ScaleReader>,
    pub writer: Box<dyn ScaleWriter>,
}

impl ScaleLink {
    pub fn new(reader: Box<dyn ScaleReader>, writer: Box<dyn ScaleWriter>) -> Self {
        Self { reader, writer }
    }
}

/// Opens links to a scale. Control lines (DTR/RTS) are asserted by the driver on open when
/// the transport has them.
#[async_trait]
pub trait ScaleDriver: Send + Sync {
    async fn open(&self, config: &ScaleConnectionConfig) -> Result<ScaleLink, DomainError>;

    /// Get driver type identifier
    fn driver_type(&self) -> &str;
}
