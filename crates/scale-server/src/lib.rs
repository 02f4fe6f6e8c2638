pub mod api;
pub mod state;

use application::{ScaleSession, SubscriberBroadcast};
use infrastructure::{DriverFactory, ServerConfig, WeightFrameParser};
use state::AppState;
use std::sync::Arc;

/// Wires driver, catalog, parser and broadcast together from loaded configuration.
pub fn setup_app_state(config: &ServerConfig) -> Arc<AppState> {
    let (driver, catalog) = DriverFactory::create(config.scale.driver, &config.scale.simulator);
    let broadcast = Arc::new(SubscriberBroadcast::new(config.subscribers.buffer));
    let parser = WeightFrameParser::with_formats(&config.scale.frame_formats());

    let session = ScaleSession::new(driver, catalog, broadcast.clone(), parser);
    Arc::new(AppState::new(session, broadcast, config.scale.clone()))
}
