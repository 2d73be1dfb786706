// ABOUTME: Timestamp helpers for the Nightscout wire format
// ABOUTME: Millisecond-precision ISO-8601 strings and epoch millisecond conversion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Format a timestamp as `2015-10-19T15:17:50.381Z`
#[must_use]
pub fn to_iso_string(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert epoch milliseconds to a UTC timestamp
#[must_use]
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Serde adapter writing `DateTime<Utc>` with exactly three fractional digits
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a millisecond ISO-8601 string
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_iso_string(*timestamp))
    }

    /// Deserialize from any RFC 3339 string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not RFC 3339
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
