// ABOUTME: Lookup table from CareLink trend codes to Nightscout trend and direction
// ABOUTME: Preserves the vendor table as observed, including the code 7 collision
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Nightscout trend number and direction label for one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendArrow {
    /// Nightscout numeric trend
    pub trend: u8,
    /// Nightscout direction label
    pub direction: &'static str,
}

impl TrendArrow {
    const fn new(trend: u8, direction: &'static str) -> Self {
        Self { trend, direction }
    }
}

/// Look up the arrow for a `lastSGTrend` value.
///
/// `DOWN_DOUBLE` and `DOWN_TRIPLE` both carry trend 7 while their directions
/// differ. Kept as-is until downstream semantics are confirmed.
#[must_use]
pub fn trend_arrow(code: &str) -> Option<TrendArrow> {
    let arrow = match code {
        "NONE" => TrendArrow::new(0, "NONE"),
        "UP_TRIPLE" => TrendArrow::new(1, "TripleUp"),
        "UP_DOUBLE" => TrendArrow::new(1, "DoubleUp"),
        "UP" => TrendArrow::new(2, "SingleUp"),
        "DOWN" => TrendArrow::new(6, "SingleDown"),
        "DOWN_DOUBLE" => TrendArrow::new(7, "DoubleDown"),
        "DOWN_TRIPLE" => TrendArrow::new(7, "TripleDown"),
        _ => return None,
    };
    Some(arrow)
}
