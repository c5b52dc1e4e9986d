// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff schedule.
//!
//! `delay(k) = min(base_delay * factor^(k-1), max_delay)` for the wait that
//! follows failed attempt `k` (1-based). With `factor >= 1` the sequence is
//! non-decreasing and never exceeds `max_delay`.

use std::time::Duration;

use crate::error::{Error, Result};

/// Backoff parameters for one retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    factor: f64,
}

impl Backoff {
    /// Creates a schedule, rejecting parameters that would shrink delays.
    pub fn new(base_delay: Duration, max_delay: Duration, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(Error::InvalidPolicy(format!("backoff factor must be >= 1, got {factor}")));
        }
        if max_delay < base_delay {
            return Err(Error::InvalidPolicy(format!(
                "max delay {}ms is below base delay {}ms",
                max_delay.as_millis(),
                base_delay.as_millis()
            )));
        }
        Ok(Backoff { base_delay, max_delay, factor })
    }

    /// Schedule that never waits. Useful for tests and for local-only work.
    pub fn immediate() -> Self {
        Backoff { base_delay: Duration::ZERO, max_delay: Duration::ZERO, factor: 1.0 }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_nanos() as f64 * self.factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(scaled.round() as u64).min(self.max_delay)
    }

    /// Every wait a policy with `max_attempts` attempts could perform.
    pub fn schedule(&self, max_attempts: u32) -> Vec<Duration> {
        (1..max_attempts).map(|attempt| self.delay_for(attempt)).collect()
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            factor: 2.0,
        }
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
