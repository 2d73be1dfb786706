// ABOUTME: Error types for snapshot normalization and Nightscout uploads
// ABOUTME: Structured thiserror enums; the binary converts them to anyhow at its boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to normalize a snapshot
///
/// Individual readings or markers with a bad timestamp are dropped with a
/// warning; these errors cover the snapshot-level fields every event depends on.
#[derive(Debug, Error)]
pub enum TransformError {
    /// `sMedicalDeviceTime` is missing
    #[error("snapshot carries no device clock")]
    MissingDeviceClock,

    /// `sMedicalDeviceTime` could not be parsed
    #[error("device clock {raw:?} is not a recognizable timestamp")]
    DeviceClock {
        /// Raw device clock string
        raw: String,
    },

    /// Device and server clocks disagree by a day or more
    #[error("inferred pump offset of {hours} hours is out of range")]
    OffsetOutOfRange {
        /// Rounded hour difference between device and server clocks
        hours: i64,
    },

    /// A server epoch timestamp cannot be represented
    #[error("server timestamp {millis} is out of range")]
    ServerTime {
        /// Epoch milliseconds as received
        millis: i64,
    },
}

/// Failure to deliver a batch to Nightscout
#[derive(Debug, Error)]
pub enum UploadError {
    /// The HTTP client could not be constructed
    #[error("failed to build Nightscout HTTP client")]
    Client(#[source] reqwest::Error),

    /// Endpoint URL could not be derived from the base URL
    #[error("invalid Nightscout endpoint {path}")]
    Endpoint {
        /// Relative API path
        path: &'static str,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// Events could not be encoded as JSON
    #[error("failed to encode {collection} batch")]
    Encode {
        /// Target collection
        collection: &'static str,
        /// Serializer error
        #[source]
        source: serde_json::Error,
    },

    /// Nightscout could not be reached
    #[error("failed to reach Nightscout at {url}")]
    Transport {
        /// Endpoint
        url: String,
        /// Underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// Nightscout answered with a non-success status
    #[error("Nightscout rejected upload to {url} with status {status}")]
    Status {
        /// Endpoint
        url: String,
        /// Response status
        status: StatusCode,
        /// Response body, truncated
        body: String,
    },
}
