// ABOUTME: CareLink vendor client: session negotiation, budgeted HTTP exchange, and snapshot fetching
// ABOUTME: US cookie login and EU SSO token login behind one negotiator trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # CareLink Client
//!
//! Acquires "last 24 hours" snapshots from the CareLink portal.
//!
//! The portal is a browser application, not an API: authentication means
//! replaying the login pages one request at a time, keeping cookies, and for
//! the EU portal scraping a consent form out of HTML. [`DataFetcher`] wraps
//! that in a bounded retry loop and a per-call request budget so a broken
//! login flow can never hammer the vendor.
//!
//! ```text
//! DataFetcher::fetch
//!   └─ SessionNegotiator::ensure_valid   (cookie or SSO)
//!        └─ SessionExchange::send         (cookies, bearer, budget)
//!             └─ HttpTransport::execute   (reqwest, no redirects)
//! ```

/// Region, credentials and bounds
pub mod config;
/// Negotiation and fetch errors
pub mod errors;
/// Snapshot fetching with retries
pub mod fetcher;
/// Regional login flows
pub mod negotiator;
/// Backoff policy
pub mod retry;
/// Cookie/token store and request exchange
pub mod session;
/// HTTP transport seam
pub mod transport;

pub use config::{ClientConfig, Credentials, Region};
pub use errors::{AuthError, FetchError, LoginStep};
pub use fetcher::DataFetcher;
pub use negotiator::{create_negotiator, CookieNegotiator, SessionNegotiator, SsoNegotiator};
pub use retry::RetryPolicy;
pub use session::{SessionExchange, SessionStore};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
