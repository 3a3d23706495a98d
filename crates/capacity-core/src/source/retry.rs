//! Retry with exponential backoff for transient source failures.

use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{SourceError, SourceResult};

/// Retry schedule shared by every page and detail load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Delay factor applied after each failed attempt
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
        }
    }

    /// Retries without sleeping (tests and scripted sources).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1)
    }

    /// Delay before retry number `attempt` (1 = first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    /// Run `op`, retrying `Transient` errors.
    ///
    /// Once attempts are exhausted the last transient error is returned as
    /// `Extraction`. Every other error is returned immediately.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> SourceResult<T>) -> SourceResult<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(SourceError::Transient(msg)) => {
                    if attempt >= attempts {
                        return Err(SourceError::Extraction(format!(
                            "{} failed after {} attempts: {}",
                            what, attempts, msg
                        )));
                    }
                    let delay = self.delay_for(attempt);
                    debug!(what, attempt, error = %msg, delay_ms = delay.as_millis() as u64, "Retrying");
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
