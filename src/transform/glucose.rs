// ABOUTME: Sensor glucose readings to Nightscout sgv entries
// ABOUTME: Drops missing readings and attaches the trend arrow to the newest entry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use carelink_core::{trend_arrow, GlucoseEntry, SensorGlucose, Snapshot};
use tracing::warn;

use super::clock::PumpClock;

/// Sensor readings with a value, oldest first
pub(crate) fn glucose_entries(snapshot: &Snapshot, clock: &PumpClock) -> Vec<GlucoseEntry> {
    let device = snapshot.device_name();
    let mut entries = Vec::with_capacity(snapshot.sgs.len());

    for reading in snapshot
        .sgs
        .iter()
        .filter(|reading| reading.is_valid_sensor_glucose())
    {
        let Some(timestamp) = reading.datetime.as_deref().and_then(|raw| clock.resolve(raw)) else {
            warn!(
                sgv = reading.sg,
                datetime = ?reading.datetime,
                "Dropping glucose reading with unreadable timestamp"
            );
            continue;
        };
        entries.push(GlucoseEntry::new(reading.sg, timestamp, device.clone()));
    }

    // The vendor only knows the trend of the newest reading; if that one is
    // missing the arrow belongs to no emitted entry.
    let newest_has_value = snapshot.sgs.last().is_some_and(SensorGlucose::has_value);
    if newest_has_value {
        let arrow = snapshot.last_sg_trend.as_deref().and_then(trend_arrow);
        if let (Some(entry), Some(arrow)) = (entries.last_mut(), arrow) {
            entry.set_trend(arrow);
        }
    }

    entries
}
