//! Adaptive polling interval
//!
//! Multiplicative backoff with fast recovery: halve the interval when a
//! window saw more changes than the threshold, double it otherwise. The
//! result is always clamped to `[min, max]`.

use crate::config::WatchConfig;
use std::time::Duration;

/// Computes the next polling interval from recent activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalController {
    min: Duration,
    max: Duration,
    activity_threshold: u32,
    window: u32,
}

impl IntervalController {
    /// Controller with the default threshold (5) and a one-cycle window
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            activity_threshold: 5,
            window: 1,
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            min: config.min_interval(),
            max: config.max_interval(),
            activity_threshold: config.activity_threshold,
            window: config.adjustment_window.max(1),
        }
    }

    pub fn with_activity_threshold(mut self, threshold: u32) -> Self {
        self.activity_threshold = threshold;
        self
    }

    pub fn with_window(mut self, cycles: u32) -> Self {
        self.window = cycles.max(1);
        self
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Poll cycles per adjustment
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Next interval given the changes seen since the last adjustment
    pub fn next_interval(&self, current: Duration, activity: u32) -> Duration {
        let next = if activity > self.activity_threshold {
            (current / 2).max(self.min)
        } else {
            current.saturating_mul(2).min(self.max)
        };

        // Keeps the result in bounds even if `current` was not
        next.clamp(self.min, self.max)
    }
}
