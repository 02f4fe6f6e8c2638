use application::{ScaleSession, SubscriberBroadcast};
use infrastructure::config::ScaleSettings;
use std::sync::Arc;

pub struct AppState {
    pub session: ScaleSession,
    pub broadcast: Arc<SubscriberBroadcast>,
    /// Serial parameters applied to every connect request
    pub settings: ScaleSettings,
}

impl AppState {
    pub fn new(
        session: ScaleSession,
        broadcast: Arc<SubscriberBroadcast>,
        settings: ScaleSettings,
    ) -> Self {
        Self {
            session,
            broadcast,
            settings,
        }
    }
}
