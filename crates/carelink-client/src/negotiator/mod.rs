// ABOUTME: Session negotiation trait and the factory selecting the regional login flow
// ABOUTME: Shared helpers for redirect handling and vendor endpoint URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Session negotiation
//!
//! A negotiator turns an unauthenticated [`SessionExchange`] into an
//! authenticated one. The US portal uses a plain form login that leaves a
//! session cookie; the EU portal runs an SSO redirect chain that ends with a
//! bearer token delivered as cookies. Both are driven one request at a time
//! with redirects surfaced, never followed.
//!
//! Negotiators never retry. Retrying is the fetcher's job.

/// US cookie login
pub mod cookie;
/// Consent page scraping
pub mod scrape;
/// EU SSO login and token refresh
pub mod sso;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::config::{ClientConfig, Region};
use crate::errors::{AuthError, LoginStep};
use crate::session::SessionExchange;
use crate::transport::HttpResponse;

pub use cookie::CookieNegotiator;
pub use sso::SsoNegotiator;

/// Establishes and maintains an authenticated vendor session
#[async_trait]
pub trait SessionNegotiator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Make sure the session in `exchange` is authenticated, logging in or
    /// refreshing as needed. Returns immediately when it already is.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when login or refresh fails
    async fn ensure_valid(&self, exchange: &mut SessionExchange) -> Result<(), AuthError>;

    /// Snapshot endpoint for a request issued at `now`
    fn snapshot_url(&self, now: DateTime<Utc>) -> Url;
}

/// Build the negotiator for the configured region
#[must_use]
pub fn create_negotiator(config: &ClientConfig) -> Box<dyn SessionNegotiator> {
    match config.region {
        Region::Us => Box::new(CookieNegotiator::new(
            config.base_url.clone(),
            config.credentials.clone(),
        )),
        Region::Eu => Box::new(SsoNegotiator::new(
            config.base_url.clone(),
            config.credentials.clone(),
            config.country_code.clone(),
            config.language_code.clone(),
            config.token_refresh_lead,
        )),
    }
}

/// `path` on the vendor portal, without query
fn endpoint(base_url: &Url, path: &str) -> Url {
    let mut url = base_url.clone();
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Snapshot URL with the fixed query and the request time in epoch milliseconds
fn snapshot_endpoint(base_url: &Url, path: &str, now: DateTime<Utc>) -> Url {
    let mut url = endpoint(base_url, path);
    url.query_pairs_mut()
        .append_pair("cpSerialNumber", "NONE")
        .append_pair("msgType", "last24hours")
        .append_pair("requestTime", &now.timestamp_millis().to_string());
    url
}

/// Host of the vendor portal, used to scope cookie lookups
fn portal_host(base_url: &Url) -> &str {
    base_url.host_str().unwrap_or_default()
}

/// Accept 2xx and 3xx, reject anything else
fn ensure_accepted(step: LoginStep, response: &HttpResponse) -> Result<(), AuthError> {
    if response.status.is_success() || response.is_redirect() {
        Ok(())
    } else {
        Err(AuthError::Rejected {
            step,
            status: response.status,
        })
    }
}

/// Require a redirect and return its resolved target
fn redirect_target(step: LoginStep, response: &HttpResponse) -> Result<Url, AuthError> {
    if !response.is_redirect() {
        ensure_accepted(step, response)?;
        return Err(AuthError::protocol(
            step,
            format!("expected a redirect, got HTTP {}", response.status),
        ));
    }
    response
        .location()
        .ok_or_else(|| AuthError::protocol(step, "redirect without a usable Location header"))
}
