// ABOUTME: Client configuration: region, vendor base URL, credentials, and fetch bounds
// ABOUTME: Credentials are redacted from Debug output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::time::Duration;

use chrono::TimeDelta;
use url::Url;

use crate::retry::DEFAULT_MAX_RETRY_DURATION_SECS;

/// US vendor host
pub const DEFAULT_US_HOST: &str = "carelink.minimed.com";

/// EU vendor host
pub const DEFAULT_EU_HOST: &str = "carelink.minimed.eu";

/// Default SSO country code
pub const DEFAULT_COUNTRY_CODE: &str = "gb";

/// Default SSO language code
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

/// Default cap on outbound requests per fetch call
///
/// The longest legitimate fetch is an EU session whose refresh is rejected:
/// reauth (1), a five-step SSO login, a snapshot answered with 401, then a
/// second five-step login and snapshot. That is 13 requests; the cap leaves
/// a little headroom above it.
pub const DEFAULT_MAX_REQUESTS_PER_FETCH: u32 = 16;

/// Default HTTP timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh the bearer token when it expires within this many minutes
pub const DEFAULT_TOKEN_REFRESH_LEAD_MINUTES: i64 = 10;

/// Vendor server region, selecting the login flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// Cookie login
    #[default]
    Us,
    /// SSO login with bearer token
    Eu,
}

impl Region {
    /// Parse a region label; anything but `EU` is the US region
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("EU") {
            Self::Eu
        } else {
            Self::Us
        }
    }

    /// Vendor host used when no override is configured
    #[must_use]
    pub const fn default_host(self) -> &'static str {
        match self {
            Self::Us => DEFAULT_US_HOST,
            Self::Eu => DEFAULT_EU_HOST,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Us => "US",
            Self::Eu => "EU",
        })
    }
}

/// CareLink account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Wrap a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Account name
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account password
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything needed to build a negotiator and a fetcher
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Login flow selector
    pub region: Region,
    /// Scheme, host and optional port of the vendor portal
    pub base_url: Url,
    /// Account
    pub credentials: Credentials,
    /// SSO `country` parameter
    pub country_code: String,
    /// SSO `lang` parameter and form locale
    pub language_code: String,
    /// Refresh the token when it expires within this window
    pub token_refresh_lead: TimeDelta,
    /// Cap on outbound requests per fetch call
    pub max_requests_per_fetch: u32,
    /// Upper bound on cumulative backoff per fetch call
    pub max_retry_duration: Duration,
    /// HTTP timeout per request
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Configuration with defaults for everything but region, portal and account
    #[must_use]
    pub fn new(region: Region, base_url: Url, credentials: Credentials) -> Self {
        Self {
            region,
            base_url,
            credentials,
            country_code: DEFAULT_COUNTRY_CODE.to_owned(),
            language_code: DEFAULT_LANGUAGE_CODE.to_owned(),
            token_refresh_lead: TimeDelta::minutes(DEFAULT_TOKEN_REFRESH_LEAD_MINUTES),
            max_requests_per_fetch: DEFAULT_MAX_REQUESTS_PER_FETCH,
            max_retry_duration: Duration::from_secs(DEFAULT_MAX_RETRY_DURATION_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// `https://{host}/` for a vendor host name
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not a valid URL authority
    pub fn portal_url(host: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("https://{host}/"))
    }
}
