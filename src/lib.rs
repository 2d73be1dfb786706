// ABOUTME: Library entry point for the CareLink to Nightscout bridge
// ABOUTME: Normalization pipeline, recency filtering, Nightscout upload, and the poll loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # CareLink Bridge
//!
//! Polls the Medtronic CareLink portal for the "last 24 hours" snapshot,
//! turns it into Nightscout events and uploads whatever Nightscout has not
//! seen yet.
//!
//! ## Architecture
//!
//! - **carelink-client**: login flows and snapshot acquisition (separate crate)
//! - **transform**: snapshot to canonical events, including pump timezone inference
//! - **filter**: per-stream recency cursors that drop already-uploaded events
//! - **nightscout**: REST uploader
//! - **poller**: fetch, transform, filter, upload, sleep
//! - **config** / **logging**: environment-driven bootstrap
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use carelink_bridge::config::BridgeConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::from_env()?;
//!     println!("{}", config.summary());
//!     Ok(())
//! }
//! ```

/// Environment configuration
pub mod config;

/// Error types for normalization and upload
pub mod errors;

/// Per-stream duplicate suppression
pub mod filter;

/// Tracing subscriber setup
pub mod logging;

/// Nightscout REST client
pub mod nightscout;

/// Poll loop
pub mod poller;

/// Snapshot normalization
pub mod transform;

pub use errors::{TransformError, UploadError};
pub use filter::{RecencyFilter, StreamFilters};
pub use nightscout::{Collection, DryRunSink, EventSink, NightscoutClient};
pub use poller::{CycleReport, Poller};
pub use transform::{NormalizedSnapshot, Normalizer, TransformLimits};
