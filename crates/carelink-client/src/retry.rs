// ABOUTME: Bounded exponential backoff for snapshot fetching
// ABOUTME: Delay doubles per attempt and retries stop once the cumulative delay would exceed the bound
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

/// Default upper bound on cumulative backoff in seconds
pub const DEFAULT_MAX_RETRY_DURATION_SECS: u64 = 512;

/// Retry bound for one fetch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Cumulative backoff may not exceed this
    pub max_retry_duration: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_duration: Duration::from_secs(DEFAULT_MAX_RETRY_DURATION_SECS),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given bound
    #[must_use]
    pub const fn new(max_retry_duration: Duration) -> Self {
        Self { max_retry_duration }
    }

    /// Backoff after failed attempt `attempt` (1-based): `2^attempt` seconds
    #[must_use]
    pub fn delay_for_attempt(attempt: u32) -> Option<Duration> {
        2_u64.checked_pow(attempt).map(Duration::from_secs)
    }

    /// Delay before the next attempt, or `None` when the bound forbids another.
    ///
    /// `slept` is the backoff already spent in this fetch call.
    #[must_use]
    pub fn next_delay(&self, failed_attempt: u32, slept: Duration) -> Option<Duration> {
        let delay = Self::delay_for_attempt(failed_attempt)?;
        let total = slept.checked_add(delay)?;
        (total <= self.max_retry_duration).then_some(delay)
    }
}
