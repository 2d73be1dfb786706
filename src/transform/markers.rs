// ABOUTME: NGP event markers to Nightscout treatments and finger-stick checks
// ABOUTME: Merges a meal with the insulin bolus logged at the same device time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use carelink_core::constants::{MARKER_INSULIN, MARKER_MEAL};
use carelink_core::time::to_iso_string;
use carelink_core::{BgCheck, Marker, MarkerKind, Snapshot, Treatment};
use chrono::{DateTime, Utc};
use tracing::warn;

use super::clock::PumpClock;

/// Meal and insulin treatments, oldest first, with boluses folded into meals
pub(crate) fn treatments(snapshot: &Snapshot, clock: &PumpClock) -> Vec<Treatment> {
    let mut treatments: Vec<Treatment> = snapshot
        .markers
        .iter()
        .filter(|marker| matches!(marker.kind(), MarkerKind::Insulin | MarkerKind::Meal))
        .filter_map(|marker| {
            let (timestamp, date_time) = resolve_marker(marker, clock)?;
            Some(Treatment {
                event_type: event_type_label(&marker.marker_type),
                created_at: timestamp.timestamp_millis(),
                date_string: to_iso_string(timestamp),
                date_time,
                carbs: marker.amount.unwrap_or(0.0),
                insulin: delivered_insulin(marker),
            })
        })
        .collect();
    treatments.sort_by_key(|treatment| treatment.created_at);
    merge_meal_insulin(treatments)
}

/// Calibrations and meter readings with a value, oldest first
pub(crate) fn bg_checks(snapshot: &Snapshot, clock: &PumpClock) -> Vec<BgCheck> {
    let mut checks: Vec<BgCheck> = snapshot
        .markers
        .iter()
        .filter(|marker| marker.kind() == MarkerKind::BloodGlucose)
        .filter_map(|marker| {
            let glucose = marker.value.filter(|value| *value != 0.0)?;
            let (timestamp, date_time) = resolve_marker(marker, clock)?;
            Some(BgCheck::new(glucose, timestamp, date_time))
        })
        .collect();
    checks.sort_by_key(|check| check.created_at);
    checks
}

fn resolve_marker(marker: &Marker, clock: &PumpClock) -> Option<(DateTime<Utc>, String)> {
    let raw = marker.date_time.as_deref()?;
    let Some(timestamp) = clock.resolve(raw) else {
        warn!(
            marker = %marker.marker_type,
            date_time = raw,
            "Dropping marker with unreadable timestamp"
        );
        return None;
    };
    Some((timestamp, raw.to_owned()))
}

/// Both bolus parts are required; a partial report counts as nothing delivered
fn delivered_insulin(marker: &Marker) -> f64 {
    match (marker.delivered_fast_amount, marker.delivered_extended_amount) {
        (Some(fast), Some(extended)) => fast + extended,
        _ => 0.0,
    }
}

/// `INSULIN` -> `Insulin`
fn event_type_label(marker_type: &str) -> String {
    let mut chars = marker_type.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect()
    })
}

/// Each meal takes the insulin of the first bolus logged at the identical
/// device time; that bolus is zeroed and zero-valued treatments are dropped.
fn merge_meal_insulin(mut treatments: Vec<Treatment>) -> Vec<Treatment> {
    for meal in 0..treatments.len() {
        if !treatments[meal].event_type.eq_ignore_ascii_case(MARKER_MEAL) {
            continue;
        }
        let Some(bolus) = treatments.iter().position(|candidate| {
            candidate.date_time == treatments[meal].date_time
                && candidate.event_type.eq_ignore_ascii_case(MARKER_INSULIN)
        }) else {
            continue;
        };
        treatments[meal].insulin = treatments[bolus].insulin;
        treatments[bolus].carbs = 0.0;
        treatments[bolus].insulin = 0.0;
    }
    treatments.retain(|treatment| !treatment.is_empty());
    treatments
}
