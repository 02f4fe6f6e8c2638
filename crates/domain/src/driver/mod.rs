mod config;
mod connection_state;
mod driver_type;
mod port;
mod scale_driver;

pub use config::{
    DEFAULT_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS, Parity, ScaleConnectionConfig,
    clamp_poll_interval,
};
pub use connection_state::ConnectionState;
pub use driver_type::DriverType;
pub use port::{PortCatalog, PortInfo, normalize_port_path, normalize_port_path_for, resolve_port};
pub use scale_driver::{ScaleDriver, ScaleLink, ScaleReader, ScaleWriter};
