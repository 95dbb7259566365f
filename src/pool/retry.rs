//! Retry policy for outbound requests
//!
//! Produces the delay sequence fed to `tokio_retry2::Retry`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StateError};

// == Backoff ==
/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// `base * n` before the n-th retry
    Linear,
    /// `base * 2^(n-1)` before the n-th retry
    Exponential,
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backoff::Fixed => "fixed",
            Backoff::Linear => "linear",
            Backoff::Exponential => "exponential",
        };
        f.write_str(name)
    }
}

impl FromStr for Backoff {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Backoff::Fixed),
            "linear" => Ok(Backoff::Linear),
            "exponential" => Ok(Backoff::Exponential),
            other => Err(StateError::InvalidRequest(format!(
                "Unknown retry strategy '{}'",
                other
            ))),
        }
    }
}

// == Retry Policy ==
/// Bounded retry schedule for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included (minimum 1)
    pub max_attempts: u32,
    /// Delay unit
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, Backoff::Fixed)
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(retry),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    /// The delays between attempts; yields `max_attempts - 1` items.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let policy = *self;
        (1..policy.max_attempts).map(move |retry| policy.delay_for(retry))
    }
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 0.5s then 1s.
    fn default() -> Self {
        Self::new(
            3,
            Duration::from_millis(500),
            Duration::from_secs(5),
            Backoff::Linear,
        )
    }
}
