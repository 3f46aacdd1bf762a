use std::time::Duration;

use rand::Rng;

/// Default watchdog interval Tw (spec §4.2).
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(30);

/// Draws a jittered watchdog interval within ±20% of `base`, so peers on
/// the same node do not all send DWR in lockstep.
pub fn jittered_watchdog_interval(base: Duration) -> Duration {
    let base_millis = base.as_millis() as i64;
    let jitter = rand::rng().random_range(-20..=20);
    let millis = base_millis + base_millis * jitter / 100;
    Duration::from_millis(millis.max(0) as u64)
}

/// A persistent peer's reconnect backoff: doubles from 1s up to a 30s
/// ceiling on each consecutive failure, and resets once a connection
/// succeeds.
pub struct ReconnectBackoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::with_bounds(Duration::from_secs(1), Duration::from_secs(30))
    }

    pub fn with_bounds(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// The delay to wait before the next attempt, then doubles (capped)
    /// for the attempt after that.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}
