use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::constants::DEFAULT_DELIVERY_TIMEOUT;
use crate::Result;

/// Watch translator tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// How long a translated event may wait for room in the consumer channel
    /// before it is dropped
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.delivery_timeout_ms == 0 {
            return Err(invalid("watch.delivery_timeout_ms must be greater than 0"));
        }
        Ok(())
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

fn default_delivery_timeout() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT.as_millis() as u64
}
