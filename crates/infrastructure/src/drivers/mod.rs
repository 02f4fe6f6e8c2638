mod port_catalog;
mod rs232;
mod simulator;

pub use port_catalog::{StaticPortCatalog, SystemPortCatalog};
pub use rs232::RS232Driver;
pub use simulator::{SimulatorConfig, SimulatorDriver, format_fixed_frame};

use std::sync::Arc;

use domain::driver::{DriverType, PortCatalog, ScaleDriver};

/// Synthetic device exposed by the simulator catalog.
pub const SIMULATOR_PORT: &str = "SIM0";

/// Factory for creating a driver together with the catalog its ports come from
pub struct DriverFactory;

impl DriverFactory {
    pub fn create(
        driver_type: DriverType,
        simulator: &SimulatorConfig,
    ) -> (Arc<dyn ScaleDriver>, Arc<dyn PortCatalog>) {
        match driver_type {
            DriverType::RS232 => (
                Arc::new(RS232Driver::new()) as Arc<dyn ScaleDriver>,
                Arc::new(SystemPortCatalog::new()) as Arc<dyn PortCatalog>,
            ),
            DriverType::Simulator => (
                Arc::new(SimulatorDriver::new(simulator.clone())) as Arc<dyn ScaleDriver>,
                Arc::new(StaticPortCatalog::with_paths(&[SIMULATOR_PORT])) as Arc<dyn PortCatalog>,
            ),
        }
    }
}
