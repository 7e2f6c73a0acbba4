//! Retry policy: decides backoff delays for event delivery.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Retry policy for failed deliveries.
///
/// The growth is linear in the retry number, with uniform jitter around the
/// interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first try; total tries is `max_retries + 1`.
    pub max_retries: u32,

    /// Interval the multiplier scales.
    pub base_interval: Duration,

    /// Factor applied per retry number, never below one step.
    pub multiplier: f64,

    /// Half-width of the jitter window relative to the interval.
    pub randomization_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Center of the window for retry `retry` (1-indexed).
    ///
    /// `base_interval * max(multiplier * retry, multiplier)`; with the defaults:
    /// - retry 1: 750ms
    /// - retry 2: 1.5s
    /// - retry 3: 2.25s
    pub fn interval(&self, retry: u32) -> Duration {
        let factor = (self.multiplier * f64::from(retry)).max(self.multiplier);
        duration_from_secs(self.base_interval.as_secs_f64() * factor)
    }

    /// Inclusive bounds the jittered delay of retry `retry` falls into.
    pub fn delay_bounds(&self, retry: u32) -> (Duration, Duration) {
        let interval = self.interval(retry).as_secs_f64();
        let delta = self.jitter() * interval;
        (
            duration_from_secs(interval - delta),
            duration_from_secs(interval + delta),
        )
    }

    /// Calculate delay before retry `retry` (1-indexed).
    pub fn next_delay(&self, retry: u32) -> Duration {
        let (min, max) = self.delay_bounds(retry);
        if min >= max {
            return min;
        }
        let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
        duration_from_secs(secs)
    }

    /// Rejects values that make the backoff meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.multiplier",
                value: self.multiplier.to_string(),
                expected: "a finite number >= 0",
            });
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(ConfigError::InvalidValue {
                key: "retry.randomization_factor",
                value: self.randomization_factor.to_string(),
                expected: "a number between 0 and 1",
            });
        }
        Ok(())
    }

    fn jitter(&self) -> f64 {
        if self.randomization_factor.is_nan() {
            return 0.0;
        }
        self.randomization_factor.clamp(0.0, 1.0)
    }
}

/// Negative and NaN become zero, overflow saturates.
fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
