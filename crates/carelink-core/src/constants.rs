// ABOUTME: Constants shared by the CareLink client and the normalization pipeline
// ABOUTME: Staleness threshold, reading sentinels, marker type names, and Nightscout event labels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

// =============================================================================
// Snapshot freshness
// =============================================================================

/// Snapshots whose device data is older than this are not normalized
pub const STALE_DATA_THRESHOLD_MINUTES: i64 = 20;

/// Milliseconds per minute
pub const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// Milliseconds per hour
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

// =============================================================================
// Sensor readings
// =============================================================================

/// `kind` discriminator of a sensor glucose reading
pub const SENSOR_GLUCOSE_KIND: &str = "SG";

/// `sg` value the vendor reports when no reading is available
pub const MISSING_READING: u32 = 0;

// =============================================================================
// Device families
// =============================================================================

/// Pump family reporting treatment markers
pub const FAMILY_NGP: &str = "NGP";

/// CGM-only family (no pump block, absolute marker timestamps)
pub const FAMILY_GUARDIAN: &str = "GUARDIAN";

/// Legacy Paradigm pump family
pub const FAMILY_PARADIGM: &str = "PARADIGM";

/// Prefix of the Nightscout `device` field
pub const DEVICE_NAME_PREFIX: &str = "connect-";

// =============================================================================
// Marker types
// =============================================================================

/// Insulin delivery marker
pub const MARKER_INSULIN: &str = "INSULIN";

/// Meal (carbohydrate) marker
pub const MARKER_MEAL: &str = "MEAL";

/// Sensor calibration marker
pub const MARKER_CALIBRATION: &str = "CALIBRATION";

/// Finger-stick reading marker
pub const MARKER_BG_READING: &str = "BG_READING";

/// Finger-stick reading marker (older firmware)
pub const MARKER_BG: &str = "BG";

// =============================================================================
// Nightscout wire labels
// =============================================================================

/// `type` of a glucose entry
pub const SGV_ENTRY_TYPE: &str = "sgv";

/// `eventType` of a finger-stick check
pub const BG_CHECK_EVENT_TYPE: &str = "BG Check";

/// `glucoseType` of a finger-stick check
pub const BG_CHECK_GLUCOSE_TYPE: &str = "Finger";
