// ABOUTME: EU region login through the SSO redirect chain, ending in a bearer token delivered as cookies
// ABOUTME: Refreshes the token ahead of expiry and falls back to a full login when refresh is rejected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::scrape::consent_form;
use super::{
    endpoint, ensure_accepted, portal_host, redirect_target, snapshot_endpoint, SessionNegotiator,
};
use crate::config::Credentials;
use crate::errors::{AuthError, LoginStep};
use crate::session::SessionExchange;
use crate::transport::{HttpRequest, HttpResponse};

/// Cookie carrying the bearer token
pub const TOKEN_COOKIE: &str = "auth_tmp_token";

/// Cookie carrying the token expiry
pub const TOKEN_EXPIRY_COOKIE: &str = "c_token_valid_to";

const LOGIN_PATH: &str = "/patient/sso/login";
const REFRESH_PATH: &str = "/patient/sso/reauth";
const SNAPSHOT_PATH: &str = "/patient/connect/data";

/// SSO negotiator for the EU portal
#[derive(Debug, Clone)]
pub struct SsoNegotiator {
    base_url: Url,
    credentials: Credentials,
    country_code: String,
    language_code: String,
    refresh_lead: TimeDelta,
}

impl SsoNegotiator {
    /// Negotiator for the portal at `base_url`
    #[must_use]
    pub const fn new(
        base_url: Url,
        credentials: Credentials,
        country_code: String,
        language_code: String,
        refresh_lead: TimeDelta,
    ) -> Self {
        Self {
            base_url,
            credentials,
            country_code,
            language_code,
            refresh_lead,
        }
    }

    fn login_url(&self) -> Url {
        let mut url = endpoint(&self.base_url, LOGIN_PATH);
        url.query_pairs_mut()
            .append_pair("country", &self.country_code)
            .append_pair("lang", &self.language_code);
        url
    }

    /// Full S0 to S5 login
    async fn login(&self, exchange: &mut SessionExchange) -> Result<(), AuthError> {
        info!("Logging in to CareLink");

        let response = exchange.send(HttpRequest::get(self.login_url())).await?;
        let hop = redirect_target(LoginStep::SsoStart, &response)?;

        let response = exchange.send(HttpRequest::get(hop)).await?;
        let credentials_url = redirect_target(LoginStep::SsoRedirect, &response)?;

        let response = self.submit_credentials(exchange, &credentials_url).await?;
        let response = submit_consent(exchange, &response).await?;
        let callback = redirect_target(LoginStep::SsoConsent, &response)?;

        let response = exchange.send(HttpRequest::get(callback)).await?;
        ensure_accepted(LoginStep::SsoCallback, &response)?;

        self.adopt_token(exchange, LoginStep::SsoCallback)?;
        info!("CareLink login succeeded");
        Ok(())
    }

    /// S2 to S3: post the credentials to the login form
    async fn submit_credentials(
        &self,
        exchange: &mut SessionExchange,
        target: &Url,
    ) -> Result<HttpResponse, AuthError> {
        let step = LoginStep::SsoCredentials;
        let param = |name: &str| {
            target
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .ok_or_else(|| AuthError::protocol(step, format!("redirect lacks {name}")))
        };
        let session_id = param("sessionID")?;
        let session_data = param("sessionData")?;
        let locale = param("locale")?;
        let country_code = param("countrycode")?;

        let mut post_url = target.clone();
        post_url.set_query(None);
        post_url.set_fragment(None);
        post_url
            .query_pairs_mut()
            .append_pair("locale", &locale)
            .append_pair("countrycode", &country_code);

        let request = HttpRequest::post_form(
            post_url.clone(),
            &[
                ("sessionID", &session_id),
                ("sessionData", &session_data),
                ("locale", &self.language_code),
                ("action", "login"),
                ("username", self.credentials.username()),
                ("password", self.credentials.password()),
                ("actionButton", "Log in"),
            ],
        );
        let response = exchange.send(request).await?;
        ensure_accepted(step, &response)?;

        // The form is served again, pointing at itself, when credentials are wrong
        if response.body.contains(post_url.path()) {
            warn!("CareLink rejected the credentials");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(response)
    }

    /// S4 to S5 result, also used after refresh: copy token and expiry out of the jar
    fn adopt_token(&self, exchange: &mut SessionExchange, step: LoginStep) -> Result<(), AuthError> {
        let host = portal_host(&self.base_url);
        let now = Utc::now();
        let store = exchange.store();
        let token = store
            .cookie(TOKEN_COOKIE, host, now)
            .map(|cookie| cookie.value.clone())
            .ok_or_else(|| AuthError::protocol(step, format!("{TOKEN_COOKIE} cookie missing")))?;
        let raw_expiry = store
            .cookie(TOKEN_EXPIRY_COOKIE, host, now)
            .map(|cookie| cookie.value.clone())
            .ok_or_else(|| {
                AuthError::protocol(step, format!("{TOKEN_EXPIRY_COOKIE} cookie missing"))
            })?;

        let expiry = parse_token_expiry(&raw_expiry);
        if expiry.is_none() {
            warn!(raw = %raw_expiry, "token expiry not parseable, treating token as valid until rejected");
        }
        debug!(?expiry, "bearer token stored");
        exchange.store_mut().set_bearer(token, expiry);
        Ok(())
    }

    /// Exchange the current token for a fresh one
    async fn refresh(&self, exchange: &mut SessionExchange) -> Result<(), AuthError> {
        info!("Refreshing CareLink token");
        let response = exchange
            .send(HttpRequest::post_json(
                endpoint(&self.base_url, REFRESH_PATH),
                json!({}),
            ))
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            warn!("token refresh rejected, logging in again");
            exchange.store_mut().clear();
            return self.login(exchange).await;
        }
        ensure_accepted(LoginStep::TokenRefresh, &response)?;
        self.adopt_token(exchange, LoginStep::TokenRefresh)
    }
}

/// S3 to S4: accept the consent form scraped from the credential response
async fn submit_consent(
    exchange: &mut SessionExchange,
    page: &HttpResponse,
) -> Result<HttpResponse, AuthError> {
    let step = LoginStep::SsoConsent;
    let form = consent_form(&page.body)
        .ok_or_else(|| AuthError::protocol(step, "consent form action not found"))?;
    let action = page
        .url
        .join(&form.action)
        .map_err(|e| AuthError::protocol(step, format!("invalid consent form action: {e}")))?;
    let session_id = form
        .session_id
        .ok_or_else(|| AuthError::protocol(step, "consent form lacks sessionID"))?;
    let session_data = form
        .session_data
        .ok_or_else(|| AuthError::protocol(step, "consent form lacks sessionData"))?;

    let request = HttpRequest::post_form(
        action,
        &[
            ("action", "consent"),
            ("sessionID", &session_id),
            ("sessionData", &session_data),
            ("response_type", "code"),
            ("response_mode", "query"),
        ],
    );
    Ok(exchange.send(request).await?)
}

/// Parse the expiry cookie.
///
/// Accepts RFC 3339, RFC 2822, epoch milliseconds, and the JavaScript
/// `Date.toString()` form (`Tue Mar 12 2024 10:00:00 GMT+0000 (UTC)`), with or
/// without percent-encoding.
#[must_use]
pub fn parse_token_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_owned(), |d| d.into_owned());
    let value = decoded.trim().trim_matches('"');

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(millis) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    let without_label = value.split(" (").next().unwrap_or(value);
    if let Ok(parsed) = DateTime::parse_from_str(without_label, "%a %b %d %Y %H:%M:%S GMT%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl SessionNegotiator for SsoNegotiator {
    fn name(&self) -> &'static str {
        "sso"
    }

    #[instrument(skip_all, fields(negotiator = "sso"))]
    async fn ensure_valid(&self, exchange: &mut SessionExchange) -> Result<(), AuthError> {
        if exchange.store().bearer_token().is_none() {
            return self.login(exchange).await;
        }
        match exchange.store().token_expiry() {
            Some(expiry) if expiry < Utc::now() + self.refresh_lead => self.refresh(exchange).await,
            _ => Ok(()),
        }
    }

    fn snapshot_url(&self, now: DateTime<Utc>) -> Url {
        snapshot_endpoint(&self.base_url, SNAPSHOT_PATH, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_expiry_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap();
        assert_eq!(parse_token_expiry("2024-03-12T10:00:00Z"), Some(expected));
        assert_eq!(parse_token_expiry("2024-03-12T10:00:00.000Z"), Some(expected));
        assert_eq!(parse_token_expiry("Tue, 12 Mar 2024 10:00:00 GMT"), Some(expected));
        assert_eq!(
            parse_token_expiry("Tue Mar 12 2024 10:00:00 GMT+0000 (Coordinated Universal Time)"),
            Some(expected)
        );
        assert_eq!(
            parse_token_expiry("Tue%20Mar%2012%202024%2011:00:00%20GMT%2B0100"),
            Some(expected)
        );
        assert_eq!(parse_token_expiry("1710237600000"), Some(expected));
    }

    #[test]
    fn test_unparseable_expiry() {
        assert_eq!(parse_token_expiry("soon"), None);
        assert_eq!(parse_token_expiry(""), None);
    }
}
