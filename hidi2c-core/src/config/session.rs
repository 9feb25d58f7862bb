//! Session configuration

use embassy_time::Duration;
use heapless::Vec;
use hidi2c_protocol::FEATURE_REPORT_SIZES;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of feature report sizes to try
pub const MAX_FEATURE_SIZES: usize = 4;

/// Default read timeout
pub const DEFAULT_READ_TIMEOUT_MS: u32 = 1000;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SessionConfig {
    /// Deadline for reads issued by higher layers (PMBus, I2C adapter)
    pub read_timeout_ms: u32,
    /// Padded system-settings report sizes, tried in order until one is accepted
    ///
    /// Host HID stacks disagree on the size the bridge expects.
    pub feature_report_sizes: Vec<u8, MAX_FEATURE_SIZES>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut feature_report_sizes = Vec::new();
        for size in FEATURE_REPORT_SIZES {
            // Capacity exceeds the default list
            let _ = feature_report_sizes.push(size);
        }

        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            feature_report_sizes,
        }
    }
}

impl SessionConfig {
    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms as u64)
    }

    /// Override the read timeout
    pub fn with_read_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }
}
