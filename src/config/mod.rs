// ABOUTME: Configuration module for the bridge process
// ABOUTME: Environment-only configuration; no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Environment variable loading
pub mod environment;

pub use environment::{BridgeConfig, NightscoutConfig};
