//! Bounded retry for event handling.

use std::time::Duration;

use backoff::ExponentialBackoff;

/// How many times to try, and how long to wait in between.
///
/// Delays follow an exponential schedule starting at `initial` and doubling
/// up to `max`, jittered by `randomization`. Attempts are capped at
/// `max_attempts` regardless of elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts including the first one. Zero is treated as one.
  pub max_attempts:  u32,
  pub initial:       Duration,
  pub max:           Duration,
  /// Jitter factor in `[0, 1)`; zero gives an exact doubling schedule.
  pub randomization: f64,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32) -> Self {
    Self {
      max_attempts,
      initial: Duration::from_millis(100),
      max: Duration::from_secs(5),
      randomization: 0.5,
    }
  }

  /// Retry up to `max_attempts` times without waiting.
  pub fn immediate(max_attempts: u32) -> Self {
    Self { initial: Duration::ZERO, max: Duration::ZERO, ..Self::new(max_attempts) }
  }

  pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
    self.initial = initial;
    self.max = max.max(initial);
    self
  }

  pub fn with_randomization(mut self, factor: f64) -> Self {
    self.randomization = factor.clamp(0.0, 0.99);
    self
  }

  /// Whether another attempt may follow the `attempt`-th failure.
  pub fn should_retry(&self, attempt: u32) -> bool {
    attempt < self.max_attempts.max(1)
  }

  /// A fresh delay schedule for one event. Elapsed time is not bounded;
  /// [`RetryPolicy::should_retry`] bounds the attempts.
  pub fn backoff(&self) -> ExponentialBackoff {
    ExponentialBackoff {
      current_interval: self.initial,
      initial_interval: self.initial,
      max_interval: self.max,
      multiplier: 2.0,
      randomization_factor: self.randomization,
      max_elapsed_time: None,
      ..Default::default()
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self { Self::new(10) }
}
