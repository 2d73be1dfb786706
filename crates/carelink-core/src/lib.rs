// ABOUTME: Core types and constants for the CareLink to Nightscout bridge
// ABOUTME: Foundation crate with the vendor snapshot schema, canonical events, and trend table
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # CareLink Core
//!
//! Shared types used by both the vendor client and the normalization pipeline.
//! This crate has no network or runtime dependencies so it changes rarely and
//! keeps incremental builds of the workspace cheap.
//!
//! ## Modules
//!
//! - **snapshot**: the vendor "last 24 hours" payload as it arrives over the wire
//! - **models**: canonical Nightscout events produced by the normalizer
//! - **trend**: the fixed vendor trend code to Nightscout trend/direction table
//! - **constants**: thresholds, sentinels and vendor discriminators
//! - **time**: ISO-8601 formatting helpers matching the Nightscout wire format

/// Thresholds, sentinels and vendor discriminator strings
pub mod constants;

/// Canonical Nightscout event types
pub mod models;

/// Vendor snapshot payload types
pub mod snapshot;

/// Timestamp formatting helpers
pub mod time;

/// Vendor trend code lookup
pub mod trend;

pub use models::{BgCheck, DeviceStatus, GlucoseEntry, Treatment};
pub use snapshot::{DeviceFamily, Marker, MarkerKind, SensorGlucose, Snapshot};
pub use trend::{trend_arrow, TrendArrow};
