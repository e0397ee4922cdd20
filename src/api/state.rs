//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::storage::LogStore;
use crate::websocket::Hub;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Log store for reading/writing records
    pub store: Arc<LogStore>,
    /// Handle to the live stream hub
    pub hub: Hub,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<LogStore>, hub: Hub, config: ServerConfig) -> Self {
        Self {
            store,
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Live stream subscribers currently registered
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}
