//! Controller configuration

/// Default capacity of each client's notification channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Broadcast controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Events buffered per client before further events are dropped
    pub channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ControllerConfig {
    /// Set the per-client channel capacity (at least 1)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}
