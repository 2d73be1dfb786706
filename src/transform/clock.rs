// ABOUTME: Pump clock handling: parsing zone-less device timestamps and inferring the pump's UTC offset
// ABOUTME: Resolves device-local strings to UTC either in the inferred zone or by subtracting the offset
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Pump clock
//!
//! CareLink reports device timestamps as wall-clock strings without a zone.
//! The server advances the device clock even when the pump is offline, so the
//! difference between `sMedicalDeviceTime` and `currentServerTime` is always
//! close to a whole number of hours and gives away the pump's timezone.

use std::fmt;

use carelink_core::constants::MILLIS_PER_HOUR;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone, Utc};

use crate::errors::TransformError;

/// Legacy device clock format, e.g. `Oct 19, 2015 08:20:00`
const LEGACY_FORMAT: &str = "%b %d, %Y %H:%M:%S";

/// ISO-8601 without a zone, fractional seconds optional
const NAIVE_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const SECONDS_PER_HOUR: i32 = 3600;

/// A parsed device timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTime {
    /// Wall-clock time with no zone information
    Local(NaiveDateTime),
    /// Timestamp that carried its own offset
    Zoned(DateTime<FixedOffset>),
}

impl DeviceTime {
    /// Parse either the legacy format or ISO-8601, with or without an offset
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(local) = NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT) {
            return Some(Self::Local(local));
        }
        if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self::Zoned(zoned));
        }
        NaiveDateTime::parse_from_str(raw, NAIVE_ISO_FORMAT)
            .ok()
            .map(Self::Local)
    }

    /// The instant this timestamp names when zone-less wall time is read as UTC
    #[must_use]
    pub fn as_if_utc(&self) -> DateTime<Utc> {
        match self {
            Self::Local(local) => local.and_utc(),
            Self::Zoned(zoned) => zoned.with_timezone(&Utc),
        }
    }

    /// Interpret wall time in `zone`; zoned timestamps keep their own offset
    #[must_use]
    pub fn in_zone(&self, zone: FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            Self::Local(local) => zone
                .from_local_datetime(local)
                .single()
                .map(|resolved| resolved.with_timezone(&Utc)),
            Self::Zoned(zoned) => Some(zoned.with_timezone(&Utc)),
        }
    }
}

/// Pump UTC offset in whole hours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOffset {
    hours: i32,
    zone: FixedOffset,
}

impl PumpOffset {
    /// Infer the offset from the device clock and the server clock (epoch ms).
    ///
    /// The hour difference is rounded half up, so -2.5 h becomes -2 h.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::OffsetOutOfRange`] when the clocks disagree by
    /// 24 hours or more
    pub fn infer(device_clock: &DeviceTime, server_time_millis: i64) -> Result<Self, TransformError> {
        let difference = device_clock
            .as_if_utc()
            .timestamp_millis()
            .saturating_sub(server_time_millis);
        let hours = (difference as f64 / MILLIS_PER_HOUR as f64 + 0.5).floor() as i64;
        Self::from_hours(hours)
    }

    /// Build an offset from whole hours east of UTC
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::OffsetOutOfRange`] outside (-24, 24)
    pub fn from_hours(hours: i64) -> Result<Self, TransformError> {
        let out_of_range = || TransformError::OffsetOutOfRange { hours };
        let whole = i32::try_from(hours).map_err(|_| out_of_range())?;
        let zone = whole
            .checked_mul(SECONDS_PER_HOUR)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(out_of_range)?;
        Ok(Self { hours: whole, zone })
    }

    /// Whole hours east of UTC
    #[must_use]
    pub const fn hours(&self) -> i32 {
        self.hours
    }

    /// Offset in milliseconds
    #[must_use]
    pub fn millis(&self) -> i64 {
        i64::from(self.hours) * MILLIS_PER_HOUR
    }

    /// The offset as a fixed timezone
    #[must_use]
    pub const fn zone(&self) -> FixedOffset {
        self.zone
    }
}

impl fmt::Display for PumpOffset {
    /// `-0700`, `+0000`, `+1100`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.hours >= 0 { '+' } else { '-' };
        write!(f, "{sign}{:02}00", self.hours.unsigned_abs())
    }
}

/// How device timestamps map to UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Wall time is local to the inferred pump zone
    Local,
    /// Wall time is read as UTC and the inferred offset subtracted
    ///
    /// Used by the EU portal and by Guardian devices, which report device
    /// strings that are already shifted.
    Shifted,
}

/// Resolves device timestamps for one snapshot
#[derive(Debug, Clone, Copy)]
pub struct PumpClock {
    offset: PumpOffset,
    mode: ClockMode,
}

impl PumpClock {
    /// Create a resolver
    #[must_use]
    pub const fn new(offset: PumpOffset, mode: ClockMode) -> Self {
        Self { offset, mode }
    }

    /// The inferred offset
    #[must_use]
    pub const fn offset(&self) -> PumpOffset {
        self.offset
    }

    /// Resolution mode
    #[must_use]
    pub const fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Resolve an already parsed device timestamp
    #[must_use]
    pub fn resolve_parsed(&self, device_time: &DeviceTime) -> Option<DateTime<Utc>> {
        match self.mode {
            ClockMode::Local => device_time.in_zone(self.offset.zone()),
            ClockMode::Shifted => device_time
                .as_if_utc()
                .checked_sub_signed(TimeDelta::milliseconds(self.offset.millis())),
        }
    }

    /// Parse and resolve a raw device timestamp
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<DateTime<Utc>> {
        DeviceTime::parse(raw).and_then(|parsed| self.resolve_parsed(&parsed))
    }
}
