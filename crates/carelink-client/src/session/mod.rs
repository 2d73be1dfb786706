// ABOUTME: Session state and the request path every CareLink call goes through
// ABOUTME: Re-exports the cookie/token store and the budgeted session exchange
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Budgeted request execution with cookie handling
pub mod exchange;
/// Cookie jar and bearer token
pub mod store;

pub use exchange::{ExchangeError, SessionExchange};
pub use store::{SessionStore, StoredCookie};
