//! Jittered intervals
//!
//! Every timer in the live-update system (heartbeats, forced refreshes, reaper
//! passes, push spacing, client backoff) sleeps for a random duration within a
//! range so that many connections opened at once do not fire in lockstep.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive range of durations to sample from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterRange {
    pub min: Duration,
    pub max: Duration,
}

impl JitterRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self::new(Duration::from_secs(min), Duration::from_secs(max))
    }

    /// Pick a duration uniformly within the range
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max && !self.max.is_zero()
    }
}
