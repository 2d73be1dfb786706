// ABOUTME: Normalizes one CareLink snapshot into Nightscout events
// ABOUTME: Staleness gate, pump timezone inference, per-stream conversion, and tail truncation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Normalization pipeline
//!
//! ```text
//! Snapshot
//!   ├─ stale (> 20 min)?          -> empty result
//!   ├─ infer pump offset          -> PumpClock
//!   ├─ device status              (always one)
//!   ├─ glucose entries            (trend on the newest)
//!   └─ treatments + BG checks     (NGP only)
//! ```
//!
//! The transformation is pure except for the remembered offset, which only
//! controls whether a changed timezone guess gets logged.

/// Device clock parsing and offset inference
pub mod clock;

mod device_status;
mod glucose;
mod markers;

use carelink_client::Region;
use carelink_core::constants::{MILLIS_PER_MINUTE, STALE_DATA_THRESHOLD_MINUTES};
use carelink_core::{BgCheck, DeviceFamily, DeviceStatus, GlucoseEntry, Snapshot, Treatment};
use tracing::{debug, info, instrument};

use self::clock::{ClockMode, DeviceTime, PumpClock, PumpOffset};
use crate::errors::TransformError;

/// Per-stream caps on how many of the newest events to keep; `None` keeps all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformLimits {
    /// Glucose entries
    pub glucose: Option<usize>,
    /// Meal and insulin treatments
    pub treatments: Option<usize>,
    /// Finger-stick checks
    pub bg_checks: Option<usize>,
}

impl TransformLimits {
    /// No truncation on any stream
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            glucose: None,
            treatments: None,
            bg_checks: None,
        }
    }

    /// The same cap on every stream
    #[must_use]
    pub const fn uniform(limit: usize) -> Self {
        Self {
            glucose: Some(limit),
            treatments: Some(limit),
            bg_checks: Some(limit),
        }
    }
}

/// Events produced from one snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSnapshot {
    /// Zero (stale data) or one device status
    pub device_status: Vec<DeviceStatus>,
    /// Glucose entries, oldest first
    pub glucose: Vec<GlucoseEntry>,
    /// Meal and insulin treatments, oldest first
    pub treatments: Vec<Treatment>,
    /// Finger-stick checks, oldest first
    pub bg_checks: Vec<BgCheck>,
    /// Set when the snapshot was skipped as stale
    pub stale: bool,
}

impl NormalizedSnapshot {
    /// Whether every stream is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.device_status.is_empty()
            && self.glucose.is_empty()
            && self.treatments.is_empty()
            && self.bg_checks.is_empty()
    }

    fn stale() -> Self {
        Self {
            stale: true,
            ..Self::default()
        }
    }
}

/// Snapshot normalizer for one account
#[derive(Debug, Clone)]
pub struct Normalizer {
    region: Region,
    last_offset: Option<PumpOffset>,
}

impl Normalizer {
    /// Create a normalizer for snapshots from `region`
    #[must_use]
    pub const fn new(region: Region) -> Self {
        Self {
            region,
            last_offset: None,
        }
    }

    /// Most recently inferred pump offset
    #[must_use]
    pub const fn last_offset(&self) -> Option<PumpOffset> {
        self.last_offset
    }

    /// Convert a snapshot into Nightscout events
    ///
    /// # Errors
    ///
    /// Returns an error if the device clock or the server timestamps of a
    /// fresh snapshot cannot be interpreted
    #[instrument(skip_all, fields(family = %snapshot.medical_device_family))]
    pub fn transform(
        &mut self,
        snapshot: &Snapshot,
        limits: &TransformLimits,
    ) -> Result<NormalizedSnapshot, TransformError> {
        let age_minutes = snapshot.data_age_millis() as f64 / MILLIS_PER_MINUTE as f64;
        if age_minutes > STALE_DATA_THRESHOLD_MINUTES as f64 {
            info!(
                age_minutes = format!("{age_minutes:.2}"),
                "Stale CareLink data, skipping"
            );
            return Ok(NormalizedSnapshot::stale());
        }

        let raw_clock = snapshot
            .medical_device_time
            .as_deref()
            .ok_or(TransformError::MissingDeviceClock)?;
        let device_clock = DeviceTime::parse(raw_clock).ok_or_else(|| TransformError::DeviceClock {
            raw: raw_clock.to_owned(),
        })?;
        let offset = PumpOffset::infer(&device_clock, snapshot.current_server_time)?;
        self.remember_offset(offset, raw_clock, snapshot.current_server_time);

        let family = snapshot.device_family();
        let clock = PumpClock::new(offset, self.clock_mode(&family));

        let device_status = device_status::device_status(snapshot, &clock, &device_clock)?;
        let glucose = glucose::glucose_entries(snapshot, &clock);
        let (treatments, bg_checks) = if family == DeviceFamily::Ngp {
            (
                markers::treatments(snapshot, &clock),
                markers::bg_checks(snapshot, &clock),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let normalized = NormalizedSnapshot {
            device_status: vec![device_status],
            glucose: keep_newest(glucose, limits.glucose),
            treatments: keep_newest(treatments, limits.treatments),
            bg_checks: keep_newest(bg_checks, limits.bg_checks),
            stale: false,
        };
        debug!(
            glucose = normalized.glucose.len(),
            treatments = normalized.treatments.len(),
            bg_checks = normalized.bg_checks.len(),
            "Snapshot normalized"
        );
        Ok(normalized)
    }

    fn clock_mode(&self, family: &DeviceFamily) -> ClockMode {
        if self.region == Region::Eu || *family == DeviceFamily::Guardian {
            ClockMode::Shifted
        } else {
            ClockMode::Local
        }
    }

    fn remember_offset(&mut self, offset: PumpOffset, raw_clock: &str, server_time: i64) {
        if self.last_offset != Some(offset) {
            info!(
                offset = %offset,
                pump_time = raw_clock,
                server_time,
                "Guessed pump timezone"
            );
        }
        self.last_offset = Some(offset);
    }
}

/// Keep the last `limit` items
fn keep_newest<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        let excess = items.len().saturating_sub(limit);
        items.drain(..excess);
    }
    items
}
