// ABOUTME: CareLink "last 24 hours" payload types as delivered by the vendor
// ABOUTME: Only the consumed fields are typed; everything else in the payload is ignored
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Vendor snapshot schema
//!
//! Field names follow the vendor JSON (camelCase, with a few irregular names
//! such as `sMedicalDeviceTime` and `lastSGTrend`). Nearly every field is
//! optional: the vendor omits or nulls fields freely depending on device family,
//! firmware and region, and a partial snapshot must still normalize.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEVICE_NAME_PREFIX, FAMILY_GUARDIAN, FAMILY_NGP, FAMILY_PARADIGM, MARKER_BG,
    MARKER_BG_READING, MARKER_CALIBRATION, MARKER_INSULIN, MARKER_MEAL, MISSING_READING,
    SENSOR_GLUCOSE_KIND,
};

/// One vendor telemetry payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Sensor glucose readings, ascending by device time
    #[serde(default)]
    pub sgs: Vec<SensorGlucose>,
    /// Generic event markers (insulin, meals, calibrations)
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// Trend of the most recent reading
    #[serde(rename = "lastSGTrend", default)]
    pub last_sg_trend: Option<String>,
    /// Server clock when the payload was produced (epoch ms)
    #[serde(default)]
    pub current_server_time: i64,
    /// Server clock when the device last uploaded (epoch ms)
    #[serde(default)]
    pub last_medical_device_data_update_server_time: i64,
    /// Device-local clock with no zone information
    #[serde(rename = "sMedicalDeviceTime", default)]
    pub medical_device_time: Option<String>,
    /// Device family such as `PARADIGM`, `NGP` or `GUARDIAN`
    #[serde(default)]
    pub medical_device_family: String,
    /// Device serial number
    #[serde(default)]
    pub medical_device_serial_number: Option<String>,
    /// Uploader (phone/conduit) battery percentage
    #[serde(default)]
    pub conduit_battery_level: Option<u32>,
    /// Pump or sensor transmitter battery percentage
    #[serde(default)]
    pub medical_device_battery_level_percent: Option<u32>,
    /// Insulin left in the reservoir
    #[serde(default)]
    pub reservoir_remaining_units: Option<f64>,
    /// Reservoir amount as reported by older firmware
    #[serde(default)]
    pub reservoir_amount: Option<f64>,
    /// Insulin on board
    #[serde(default)]
    pub active_insulin: Option<ActiveInsulin>,
    /// Sensor state label
    #[serde(default)]
    pub sensor_state: Option<String>,
    /// Calibration status label
    #[serde(default)]
    pub calib_status: Option<String>,
    /// Hours left on the current sensor
    #[serde(default)]
    pub sensor_duration_hours: Option<i64>,
    /// Hours until the next calibration is due
    #[serde(default)]
    pub time_to_next_calib_hours: Option<i64>,
    /// Whether the uploader is reachable
    #[serde(default)]
    pub conduit_in_range: Option<bool>,
    /// Whether the pump is in range of the uploader
    #[serde(default)]
    pub conduit_medical_device_in_range: Option<bool>,
    /// Whether the sensor is in range of the uploader
    #[serde(default)]
    pub conduit_sensor_in_range: Option<bool>,
    /// Glucose unit label (`MGDL` or `MMOL`)
    #[serde(default)]
    pub bg_units: Option<String>,
}

impl Snapshot {
    /// Device family as a typed value
    #[must_use]
    pub fn device_family(&self) -> DeviceFamily {
        DeviceFamily::from_label(&self.medical_device_family)
    }

    /// Nightscout `device` label, e.g. `connect-paradigm`
    #[must_use]
    pub fn device_name(&self) -> String {
        format!(
            "{DEVICE_NAME_PREFIX}{}",
            self.medical_device_family.to_lowercase()
        )
    }

    /// Age of the device data relative to the server clock, in milliseconds
    #[must_use]
    pub const fn data_age_millis(&self) -> i64 {
        self.current_server_time
            .saturating_sub(self.last_medical_device_data_update_server_time)
    }

    /// Reservoir level, preferring the newer field
    #[must_use]
    pub fn reservoir(&self) -> Option<f64> {
        self.reservoir_remaining_units.or(self.reservoir_amount)
    }
}

/// A single sensor glucose reading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorGlucose {
    /// Reading in mg/dL; 0 means no reading
    #[serde(default)]
    pub sg: u32,
    /// Device-local timestamp
    #[serde(default)]
    pub datetime: Option<String>,
    /// Record discriminator, `SG` for sensor glucose
    #[serde(default)]
    pub kind: Option<String>,
}

impl SensorGlucose {
    /// Whether the reading carries a value (any kind)
    #[must_use]
    pub const fn has_value(&self) -> bool {
        self.sg != MISSING_READING
    }

    /// Whether this is a sensor glucose reading with a value
    #[must_use]
    pub fn is_valid_sensor_glucose(&self) -> bool {
        self.has_value() && self.kind.as_deref() == Some(SENSOR_GLUCOSE_KIND)
    }
}

/// Insulin on board as reported by the pump
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveInsulin {
    /// Units on board; -1 when unknown
    #[serde(default)]
    pub amount: Option<f64>,
    /// Device-local time of the estimate
    #[serde(default)]
    pub datetime: Option<String>,
}

/// Generic event marker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// Marker type such as `INSULIN` or `MEAL`
    #[serde(rename = "type", default)]
    pub marker_type: String,
    /// Device-local timestamp
    #[serde(default)]
    pub date_time: Option<String>,
    /// Glucose value for calibration and finger-stick markers
    #[serde(default)]
    pub value: Option<f64>,
    /// Carbohydrates for meal markers
    #[serde(default)]
    pub amount: Option<f64>,
    /// Normal bolus part of an insulin marker
    #[serde(default)]
    pub delivered_fast_amount: Option<f64>,
    /// Extended bolus part of an insulin marker
    #[serde(default)]
    pub delivered_extended_amount: Option<f64>,
}

impl Marker {
    /// Marker type as a typed value
    #[must_use]
    pub fn kind(&self) -> MarkerKind {
        match self.marker_type.as_str() {
            MARKER_INSULIN => MarkerKind::Insulin,
            MARKER_MEAL => MarkerKind::Meal,
            MARKER_CALIBRATION | MARKER_BG_READING | MARKER_BG => MarkerKind::BloodGlucose,
            _ => MarkerKind::Other,
        }
    }
}

/// Marker categories the normalizer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Insulin delivery
    Insulin,
    /// Carbohydrate intake
    Meal,
    /// Calibration or finger-stick reading
    BloodGlucose,
    /// Anything else (alarms, exercise, ...)
    Other,
}

/// Device families with distinct normalization rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFamily {
    /// Legacy Paradigm pumps
    Paradigm,
    /// 600/700 series pumps reporting treatment markers
    Ngp,
    /// Guardian Connect CGM, no pump data
    Guardian,
    /// Any other family label
    Other(String),
}

impl DeviceFamily {
    /// Parse a vendor family label
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            FAMILY_PARADIGM => Self::Paradigm,
            FAMILY_NGP => Self::Ngp,
            FAMILY_GUARDIAN => Self::Guardian,
            other => Self::Other(other.to_owned()),
        }
    }
}
