// ABOUTME: Environment configuration for the bridge: CareLink account, region, limits, and Nightscout target
// ABOUTME: Every variable is also looked up lowercase and with the Azure connection-string prefix
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration

use std::env;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use carelink_client::{ClientConfig, Credentials, Region};
use chrono::TimeDelta;
use tracing::{info, warn};
use url::Url;

use crate::transform::TransformLimits;

/// Variable names
pub mod keys {
    /// CareLink account name
    pub const CARELINK_USERNAME: &str = "CARELINK_USERNAME";
    /// CareLink account password
    pub const CARELINK_PASSWORD: &str = "CARELINK_PASSWORD";
    /// `EU` selects the SSO portal
    pub const MMCONNECT_SERVER: &str = "MMCONNECT_SERVER";
    /// Portal host override
    pub const MMCONNECT_SERVERNAME: &str = "MMCONNECT_SERVERNAME";
    /// SSO country
    pub const MMCONNECT_COUNTRYCODE: &str = "MMCONNECT_COUNTRYCODE";
    /// SSO language
    pub const MMCONNECT_LANGCODE: &str = "MMCONNECT_LANGCODE";
    /// Poll interval in milliseconds
    pub const CARELINK_REQUEST_INTERVAL: &str = "CARELINK_REQUEST_INTERVAL";
    /// Glucose entries kept per cycle
    pub const CARELINK_SGV_LIMIT: &str = "CARELINK_SGV_LIMIT";
    /// Treatments kept per cycle
    pub const CARELINK_TREATMENT_LIMIT: &str = "CARELINK_TREATMENT_LIMIT";
    /// Finger-stick checks kept per cycle
    pub const CARELINK_BG_CHECK_LIMIT: &str = "CARELINK_BG_CHECK_LIMIT";
    /// Retry bound in seconds
    pub const CARELINK_MAX_RETRY_DURATION: &str = "CARELINK_MAX_RETRY_DURATION";
    /// Request budget per fetch
    pub const CARELINK_MAX_REQUESTS_PER_FETCH: &str = "CARELINK_MAX_REQUESTS_PER_FETCH";
    /// HTTP timeout in seconds
    pub const CARELINK_REQUEST_TIMEOUT: &str = "CARELINK_REQUEST_TIMEOUT";
    /// Token refresh lead in minutes
    pub const CARELINK_TOKEN_REFRESH_LEAD: &str = "CARELINK_TOKEN_REFRESH_LEAD";
    /// Any value lowers the default log level to `warn`
    pub const CARELINK_QUIET: &str = "CARELINK_QUIET";
    /// Nightscout base URL
    pub const NS: &str = "NS";
    /// Nightscout host, used when `NS` is unset
    pub const WEBSITE_HOSTNAME: &str = "WEBSITE_HOSTNAME";
    /// Nightscout API secret
    pub const API_SECRET: &str = "API_SECRET";
}

/// Prefix Azure App Service puts on connection strings
pub const AZURE_CONNECTION_STRING_PREFIX: &str = "CUSTOMCONNSTR_";

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60 * 1000;

/// Default per-stream event cap
pub const DEFAULT_EVENT_LIMIT: usize = 24;

/// Where and how to upload
#[derive(Clone)]
pub struct NightscoutConfig {
    /// Site root
    pub base_url: Url,
    api_secret: String,
}

impl NightscoutConfig {
    /// Create a Nightscout target
    #[must_use]
    pub fn new(base_url: Url, api_secret: impl Into<String>) -> Self {
        Self {
            base_url,
            api_secret: api_secret.into(),
        }
    }

    /// Plain API secret; hash it before sending
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl fmt::Debug for NightscoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NightscoutConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// CareLink client settings
    pub client: ClientConfig,
    /// Upload target
    pub nightscout: NightscoutConfig,
    /// Pause between cycles
    pub poll_interval: Duration,
    /// Per-stream truncation
    pub limits: TransformLimits,
}

impl BridgeConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = read_env(&lookup, keys::CARELINK_USERNAME)
            .ok_or_else(|| anyhow!("Missing CareLink username ({})", keys::CARELINK_USERNAME))?;
        let password = read_env(&lookup, keys::CARELINK_PASSWORD)
            .ok_or_else(|| anyhow!("Missing CareLink password ({})", keys::CARELINK_PASSWORD))?;

        let region = read_env(&lookup, keys::MMCONNECT_SERVER)
            .map_or(Region::Us, |label| Region::from_label(&label));
        let host = read_env(&lookup, keys::MMCONNECT_SERVERNAME)
            .unwrap_or_else(|| region.default_host().to_owned());
        let base_url = ClientConfig::portal_url(&host)
            .with_context(|| format!("Invalid {} value: {host}", keys::MMCONNECT_SERVERNAME))?;

        let mut client = ClientConfig::new(region, base_url, Credentials::new(username, password));
        if let Some(country) = read_env(&lookup, keys::MMCONNECT_COUNTRYCODE) {
            client.country_code = country;
        }
        if let Some(language) = read_env(&lookup, keys::MMCONNECT_LANGCODE) {
            client.language_code = language;
        }
        client.max_retry_duration = Duration::from_secs(parse_or(
            &lookup,
            keys::CARELINK_MAX_RETRY_DURATION,
            client.max_retry_duration.as_secs(),
        )?);
        client.max_requests_per_fetch = parse_or(
            &lookup,
            keys::CARELINK_MAX_REQUESTS_PER_FETCH,
            client.max_requests_per_fetch,
        )?;
        client.request_timeout = Duration::from_secs(parse_or(
            &lookup,
            keys::CARELINK_REQUEST_TIMEOUT,
            client.request_timeout.as_secs(),
        )?);
        let lead_minutes = parse_or(
            &lookup,
            keys::CARELINK_TOKEN_REFRESH_LEAD,
            client.token_refresh_lead.num_minutes(),
        )?;
        client.token_refresh_lead = TimeDelta::try_minutes(lead_minutes).ok_or_else(|| {
            anyhow!("{} is out of range", keys::CARELINK_TOKEN_REFRESH_LEAD)
        })?;

        let config = Self {
            client,
            nightscout: nightscout_from_lookup(&lookup)?,
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                keys::CARELINK_REQUEST_INTERVAL,
                DEFAULT_POLL_INTERVAL_MS,
            )?),
            limits: TransformLimits {
                glucose: Some(parse_or(&lookup, keys::CARELINK_SGV_LIMIT, DEFAULT_EVENT_LIMIT)?),
                treatments: Some(parse_or(
                    &lookup,
                    keys::CARELINK_TREATMENT_LIMIT,
                    DEFAULT_EVENT_LIMIT,
                )?),
                bg_checks: Some(parse_or(
                    &lookup,
                    keys::CARELINK_BG_CHECK_LIMIT,
                    DEFAULT_EVENT_LIMIT,
                )?),
            },
        };
        config.validate()?;
        if config.nightscout_is_insecure() {
            warn!(
                url = %config.nightscout.base_url,
                "Nightscout URL is not HTTPS; the hashed API secret travels in clear text"
            );
        }
        Ok(config)
    }

    /// Whether quiet logging was requested through the environment, readable
    /// before the full configuration is loaded
    #[must_use]
    pub fn quiet_from_env() -> bool {
        read_env(&|key: &str| env::var(key).ok(), keys::CARELINK_QUIET).is_some()
    }

    /// Whether uploads would go out over plain HTTP
    #[must_use]
    pub fn nightscout_is_insecure(&self) -> bool {
        self.nightscout.base_url.scheme() != "https"
    }

    /// Reject values the poll loop cannot work with
    ///
    /// # Errors
    ///
    /// Returns an error for a zero poll interval, request budget or timeout
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("{} must be positive", keys::CARELINK_REQUEST_INTERVAL));
        }
        if self.client.max_requests_per_fetch == 0 {
            return Err(anyhow!(
                "{} must be positive",
                keys::CARELINK_MAX_REQUESTS_PER_FETCH
            ));
        }
        if self.client.request_timeout.is_zero() {
            return Err(anyhow!("{} must be positive", keys::CARELINK_REQUEST_TIMEOUT));
        }
        if self.client.token_refresh_lead < TimeDelta::zero() {
            return Err(anyhow!(
                "{} cannot be negative",
                keys::CARELINK_TOKEN_REFRESH_LEAD
            ));
        }
        Ok(())
    }

    /// One-line-per-setting overview without secrets
    #[must_use]
    pub fn summary(&self) -> String {
        let limit = |limit: Option<usize>| limit.map_or_else(|| "unlimited".to_owned(), |n| n.to_string());
        format!(
            "CareLink Bridge Configuration:\n\
             - Region: {}\n\
             - Portal: {}\n\
             - Account: {}\n\
             - Nightscout: {}\n\
             - Poll Interval: {} ms\n\
             - Limits: sgv={} treatments={} bg_checks={}\n\
             - Max Retry Duration: {} s\n\
             - Max Requests Per Fetch: {}",
            self.client.region,
            self.client.base_url,
            self.client.credentials.username(),
            self.nightscout.base_url,
            self.poll_interval.as_millis(),
            limit(self.limits.glucose),
            limit(self.limits.treatments),
            limit(self.limits.bg_checks),
            self.client.max_retry_duration.as_secs(),
            self.client.max_requests_per_fetch,
        )
    }
}

fn nightscout_from_lookup<F>(lookup: &F) -> Result<NightscoutConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let raw_url = read_env(lookup, keys::NS)
        .or_else(|| read_env(lookup, keys::WEBSITE_HOSTNAME).map(|host| format!("https://{host}")))
        .ok_or_else(|| {
            anyhow!(
                "Missing Nightscout target: set {} or {}",
                keys::NS,
                keys::WEBSITE_HOSTNAME
            )
        })?;
    let base_url = Url::parse(raw_url.trim())
        .with_context(|| format!("Invalid Nightscout URL: {raw_url}"))?;
    let api_secret = read_env(lookup, keys::API_SECRET)
        .ok_or_else(|| anyhow!("Missing Nightscout API secret ({})", keys::API_SECRET))?;
    Ok(NightscoutConfig::new(base_url, api_secret))
}

/// Look up `key`, then its lowercase form, then both with the Azure prefix.
/// Empty values count as unset.
pub fn read_env<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let lower = key.to_lowercase();
    [
        key.to_owned(),
        lower.clone(),
        format!("{AZURE_CONNECTION_STRING_PREFIX}{key}"),
        format!("{AZURE_CONNECTION_STRING_PREFIX}{lower}"),
    ]
    .iter()
    .find_map(|name| lookup(name).filter(|value| !value.is_empty()))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    read_env(lookup, key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}"))
    })
}
