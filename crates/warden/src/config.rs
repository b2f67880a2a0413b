use crate::error::WardenError;
use std::time::Duration;

/// Configuration for the moderation layer.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Delay between arming a destination's flush loop and its first
    /// attempt. Small but non-zero so near-simultaneous enqueues ride the
    /// same flush. Default: 50ms.
    pub flush_initial_delay: Duration,
    /// Interval between flush retries while a destination's queue is
    /// non-empty. Default: 10s.
    pub flush_interval: Duration,
    /// Per-destination bound on pending replication messages. `None` =
    /// unbounded. When full, the oldest pending message is dropped.
    /// Default: None.
    pub queue_capacity: Option<usize>,
}

impl WardenConfig {
    /// Validate configuration values.
    ///
    /// Checks:
    /// - `flush_initial_delay > 0` (zero defeats enqueue batching)
    /// - `flush_interval > 0` (zero would spin the flush loop)
    /// - `queue_capacity != Some(0)` (a zero-capacity queue can never hold
    ///   a must-send message)
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.flush_initial_delay.is_zero() {
            return Err(WardenError::InvalidConfig {
                reason: "flush_initial_delay must be > 0".to_string(),
            });
        }
        if self.flush_interval.is_zero() {
            return Err(WardenError::InvalidConfig {
                reason: "flush_interval must be > 0".to_string(),
            });
        }
        if self.queue_capacity == Some(0) {
            return Err(WardenError::InvalidConfig {
                reason: "queue_capacity must be >= 1 when bounded".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            flush_initial_delay: Duration::from_millis(50),
            flush_interval: Duration::from_secs(10),
            queue_capacity: None,
        }
    }
}
