// ABOUTME: Stateful recency filters that suppress events already uploaded
// ABOUTME: One monotonic cursor per Nightscout stream for the lifetime of the process
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Recency filtering
//!
//! Every snapshot repeats the last 24 hours, and the vendor only knows the
//! trend of the newest reading. Re-uploading an older entry would overwrite
//! the copy Nightscout already holds and strip its trend, and device status
//! documents are not upserted at all, so each stream only passes events
//! strictly newer than anything it passed before.

use carelink_core::{BgCheck, DeviceStatus, GlucoseEntry, Treatment};
use chrono::{DateTime, Utc};

use crate::transform::NormalizedSnapshot;

/// Monotonic "newest admitted" cursor for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyFilter {
    last_seen: DateTime<Utc>,
}

impl Default for RecencyFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecencyFilter {
    /// A filter that has admitted nothing yet
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_seen: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Newest timestamp admitted so far
    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        (self.last_seen != DateTime::<Utc>::MIN_UTC).then_some(self.last_seen)
    }

    /// Keep the items strictly newer than the cursor, in their original
    /// order, then advance the cursor to the newest of them
    pub fn admit<T, F>(&mut self, items: Vec<T>, timestamp_of: F) -> Vec<T>
    where
        F: Fn(&T) -> DateTime<Utc>,
    {
        let cutoff = self.last_seen;
        let admitted: Vec<T> = items
            .into_iter()
            .filter(|item| timestamp_of(item) > cutoff)
            .collect();
        if let Some(newest) = admitted.iter().map(&timestamp_of).max() {
            self.last_seen = self.last_seen.max(newest);
        }
        admitted
    }
}

/// The four per-stream filters of one account
#[derive(Debug, Clone, Default)]
pub struct StreamFilters {
    /// Glucose entries, by reading time
    pub glucose: RecencyFilter,
    /// Device status, by `created_at`
    pub device_status: RecencyFilter,
    /// Treatments, by `created_at`
    pub treatments: RecencyFilter,
    /// Finger-stick checks, by `created_at`
    pub bg_checks: RecencyFilter,
}

impl StreamFilters {
    /// Drop already-uploaded events from every stream
    pub fn admit(&mut self, normalized: NormalizedSnapshot) -> NormalizedSnapshot {
        NormalizedSnapshot {
            device_status: self
                .device_status
                .admit(normalized.device_status, DeviceStatus::timestamp),
            glucose: self.glucose.admit(normalized.glucose, GlucoseEntry::timestamp),
            treatments: self
                .treatments
                .admit(normalized.treatments, Treatment::timestamp),
            bg_checks: self.bg_checks.admit(normalized.bg_checks, BgCheck::timestamp),
            stale: normalized.stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 9, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_starts_empty() {
        let filter = RecencyFilter::new();
        assert_eq!(filter.last_seen(), None);
    }

    #[test]
    fn test_out_of_order_input_keeps_order_and_advances_to_max() {
        let mut filter = RecencyFilter::new();
        let admitted = filter.admit(vec![at(10), at(5), at(20)], |t| *t);
        assert_eq!(admitted, vec![at(10), at(5), at(20)]);
        assert_eq!(filter.last_seen(), Some(at(20)));
    }

    #[test]
    fn test_equal_timestamp_is_not_new() {
        let mut filter = RecencyFilter::new();
        filter.admit(vec![at(10)], |t| *t);
        assert!(filter.admit(vec![at(10)], |t| *t).is_empty());
        assert_eq!(filter.admit(vec![at(10), at(11)], |t| *t), vec![at(11)]);
    }

    #[test]
    fn test_empty_call_never_regresses() {
        let mut filter = RecencyFilter::new();
        filter.admit(vec![at(30)], |t| *t);
        filter.admit(Vec::<DateTime<Utc>>::new(), |t| *t);
        filter.admit(vec![at(1)], |t| *t);
        assert_eq!(filter.last_seen(), Some(at(30)));
    }
}
