//! Application state shared across handlers.

use std::sync::Arc;

use gattway_core::{Gateway, LinkConfig, RadioDriver};

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The gateway owning the session cache and notification buffers.
    pub gateway: Gateway,
    /// Configuration the server was started with.
    pub config: Config,
}

impl AppState {
    /// Create application state over a radio driver.
    pub fn new(driver: Arc<dyn RadioDriver>, config: Config) -> Arc<Self> {
        let link_config: LinkConfig = config.radio.to_link_config();
        Arc::new(Self {
            gateway: Gateway::new(driver, link_config),
            config,
        })
    }
}
