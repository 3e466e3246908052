//! Scanner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decode::DEFAULT_DECODE_TIMEOUT;
use crate::error::ScanError;

/// Tuning for the frame scheduler and decode channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum accepted ticks per second.
    pub scan_rate: f64,
    /// Deadline for one decode round trip, in milliseconds.
    pub decode_timeout_ms: u64,
    /// Fire the per-frame debug hook with every cropped buffer.
    pub debug: bool,
    /// Also recompute the scan area on rate-limited ticks.
    pub recompute_on_throttle: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_rate: 24.0,
            decode_timeout_ms: DEFAULT_DECODE_TIMEOUT.as_millis() as u64,
            debug: false,
            recompute_on_throttle: false,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if !self.scan_rate.is_finite() || self.scan_rate <= 0.0 {
            return Err(ScanError::Configuration(format!(
                "scan_rate must be a positive number, got {}",
                self.scan_rate
            )));
        }
        if self.decode_timeout_ms == 0 {
            return Err(ScanError::Configuration(
                "decode_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_millis(self.decode_timeout_ms)
    }

    /// Minimum spacing between accepted ticks.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.scan_rate)
    }
}
