// ABOUTME: Canonical Nightscout events produced from one vendor snapshot
// ABOUTME: Glucose entries, device status, treatments, and finger-stick checks with wire-exact field names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Canonical events
//!
//! These types serialize to the JSON documents the Nightscout REST API
//! expects. Each event exposes [`timestamp`](GlucoseEntry::timestamp) so the
//! recency filter can order it without knowing the wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{BG_CHECK_EVENT_TYPE, BG_CHECK_GLUCOSE_TYPE, SGV_ENTRY_TYPE};
use crate::time::{from_epoch_millis, iso_millis, to_iso_string};
use crate::trend::TrendArrow;

/// Sensor glucose entry for the `entries` collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseEntry {
    /// Always `sgv`
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Glucose in mg/dL
    pub sgv: u32,
    /// Epoch milliseconds
    pub date: i64,
    /// ISO-8601 rendering of `date`
    pub date_string: String,
    /// Source device label
    pub device: String,
    /// Nightscout numeric trend, only on the most recent reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<u8>,
    /// Nightscout direction label, only on the most recent reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl GlucoseEntry {
    /// Create an entry without trend information
    #[must_use]
    pub fn new(sgv: u32, timestamp: DateTime<Utc>, device: impl Into<String>) -> Self {
        Self {
            entry_type: SGV_ENTRY_TYPE.to_owned(),
            sgv,
            date: timestamp.timestamp_millis(),
            date_string: to_iso_string(timestamp),
            device: device.into(),
            trend: None,
            direction: None,
        }
    }

    /// Attach a trend arrow
    pub fn set_trend(&mut self, arrow: TrendArrow) {
        self.trend = Some(arrow.trend);
        self.direction = Some(arrow.direction.to_owned());
    }

    /// Reading time
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        from_epoch_millis(self.date).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Device status document for the `devicestatus` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// When the device last uploaded
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    /// Source device label
    pub device: String,
    /// Uploader block
    pub uploader: UploaderStatus,
    /// Pump block, absent for CGM-only devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump: Option<PumpStatus>,
    /// Raw connectivity and sensor state
    pub connect: ConnectStatus,
}

impl DeviceStatus {
    /// Status time
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Uploader battery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderStatus {
    /// Battery percentage
    pub battery: Option<u32>,
}

/// Pump state at upload time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpStatus {
    /// Pump battery
    pub battery: PumpBattery,
    /// Insulin left in the reservoir
    pub reservoir: Option<f64>,
    /// Insulin on board
    pub iob: InsulinOnBoard,
    /// Pump clock resolved to UTC
    #[serde(with = "iso_millis")]
    pub clock: DateTime<Utc>,
}

/// Pump battery level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpBattery {
    /// Battery percentage
    pub percent: Option<u32>,
}

/// Insulin on board estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsulinOnBoard {
    /// Estimate time
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Units on board; omitted when the pump reports it as unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bolusiob: Option<f64>,
}

/// Vendor connectivity and sensor fields passed through unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectStatus {
    /// Sensor state label
    pub sensor_state: Option<String>,
    /// Calibration status label
    pub calib_status: Option<String>,
    /// Hours left on the sensor
    pub sensor_duration_hours: Option<i64>,
    /// Hours until calibration
    pub time_to_next_calib_hours: Option<i64>,
    /// Uploader reachable
    pub conduit_in_range: Option<bool>,
    /// Pump in range of the uploader
    pub conduit_medical_device_in_range: Option<bool>,
    /// Sensor in range of the uploader
    pub conduit_sensor_in_range: Option<bool>,
    /// Transmitter battery, CGM-only devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_device_battery_level_percent: Option<u32>,
    /// Device family, CGM-only devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_device_family: Option<String>,
}

/// Meal or insulin treatment for the `treatments` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    /// `Meal` or `Insulin`
    pub event_type: String,
    /// Epoch milliseconds
    #[serde(rename = "created_at")]
    pub created_at: i64,
    /// ISO-8601 rendering of `created_at`
    pub date_string: String,
    /// Raw device-local timestamp the marker carried
    pub date_time: String,
    /// Carbohydrates in grams
    pub carbs: f64,
    /// Delivered insulin in units
    pub insulin: f64,
}

impl Treatment {
    /// Whether both amounts are zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.carbs == 0.0 && self.insulin == 0.0
    }

    /// Treatment time
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        from_epoch_millis(self.created_at).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Finger-stick glucose check for the `treatments` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BgCheck {
    /// Always `BG Check`
    pub event_type: String,
    /// Epoch milliseconds
    #[serde(rename = "created_at")]
    pub created_at: i64,
    /// ISO-8601 rendering of `created_at`
    pub date_string: String,
    /// Raw device-local timestamp the marker carried
    pub date_time: String,
    /// Meter glucose value
    pub glucose: f64,
    /// Always `Finger`
    pub glucose_type: String,
}

impl BgCheck {
    /// Create a finger-stick check
    #[must_use]
    pub fn new(glucose: f64, timestamp: DateTime<Utc>, date_time: impl Into<String>) -> Self {
        Self {
            event_type: BG_CHECK_EVENT_TYPE.to_owned(),
            created_at: timestamp.timestamp_millis(),
            date_string: to_iso_string(timestamp),
            date_time: date_time.into(),
            glucose,
            glucose_type: BG_CHECK_GLUCOSE_TYPE.to_owned(),
        }
    }

    /// Check time
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        from_epoch_millis(self.created_at).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
