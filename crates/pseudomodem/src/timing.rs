//! Simulated device latency

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delays a modem inserts before completing its slow methods
///
/// Delays are scheduled continuations on the modem's cooperative context,
/// never blocking sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Power-up time between ENABLING and ENABLED
    pub enable_ms: u64,
    /// Power-down time between DISABLING and DISABLED
    pub disable_ms: u64,
    /// Network scan duration
    pub scan_ms: u64,
    /// Network attach duration
    pub register_ms: u64,
    /// Bearer activation time
    pub connect_ms: u64,
    /// Bearer teardown time
    pub disconnect_ms: u64,
    /// Pause between a reset's disable and the re-enable
    pub reset_ms: u64,
    /// Interval at which an operation re-checks while waiting on another
    pub poll_ms: u64,
}

impl TimingConfig {
    /// No device latency; everything completes on the next scheduler turn
    pub fn instant() -> Self {
        Self {
            enable_ms: 0,
            disable_ms: 0,
            scan_ms: 0,
            register_ms: 0,
            connect_ms: 0,
            disconnect_ms: 0,
            reset_ms: 0,
            poll_ms: 50,
        }
    }

    /// Delays in the range a real USB modem shows
    pub fn realistic() -> Self {
        Self {
            enable_ms: 1500,
            disable_ms: 500,
            scan_ms: 3000,
            register_ms: 1000,
            connect_ms: 2000,
            disconnect_ms: 500,
            reset_ms: 3000,
            poll_ms: 100,
        }
    }

    pub fn enable(&self) -> Duration {
        Duration::from_millis(self.enable_ms)
    }

    pub fn disable(&self) -> Duration {
        Duration::from_millis(self.disable_ms)
    }

    pub fn scan(&self) -> Duration {
        Duration::from_millis(self.scan_ms)
    }

    pub fn register(&self) -> Duration {
        Duration::from_millis(self.register_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn disconnect(&self) -> Duration {
        Duration::from_millis(self.disconnect_ms)
    }

    pub fn reset(&self) -> Duration {
        Duration::from_millis(self.reset_ms)
    }

    /// Polling interval, never zero so a waiting operation cannot starve
    /// the queue
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::instant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_is_never_zero() {
        let timing = TimingConfig {
            poll_ms: 0,
            ..TimingConfig::instant()
        };
        assert_eq!(timing.poll(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let timing: TimingConfig = serde_json::from_str(r#"{"scan_ms": 250}"#).unwrap();
        assert_eq!(timing.scan(), Duration::from_millis(250));
        assert_eq!(timing.enable_ms, 0);
        assert_eq!(timing.poll_ms, 50);
    }
}
