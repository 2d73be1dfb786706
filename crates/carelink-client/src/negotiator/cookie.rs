// ABOUTME: US region login: credential form POST followed by the landing page that sets the session cookie
// ABOUTME: The session is considered valid while the login cookie is present
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use url::Url;

use super::{endpoint, ensure_accepted, portal_host, snapshot_endpoint, SessionNegotiator};
use crate::config::Credentials;
use crate::errors::{AuthError, LoginStep};
use crate::session::SessionExchange;
use crate::transport::HttpRequest;

/// Cookie set by the portal once credentials are accepted
pub const LOGIN_COOKIE: &str = "_WL_AUTHCOOKIE_JSESSIONID";

const SECURITY_CHECK_PATH: &str = "/patient/j_security_check";
const LOGIN_LANDING_PATH: &str = "/patient/main/login.do";
const SNAPSHOT_PATH: &str = "/patient/connect/ConnectViewerServlet";

/// Form-login negotiator for the US portal
#[derive(Debug, Clone)]
pub struct CookieNegotiator {
    base_url: Url,
    credentials: Credentials,
}

impl CookieNegotiator {
    /// Negotiator for the portal at `base_url`
    #[must_use]
    pub const fn new(base_url: Url, credentials: Credentials) -> Self {
        Self {
            base_url,
            credentials,
        }
    }

    fn is_logged_in(&self, exchange: &SessionExchange) -> bool {
        exchange
            .store()
            .has_cookie(LOGIN_COOKIE, portal_host(&self.base_url), Utc::now())
    }
}

#[async_trait]
impl SessionNegotiator for CookieNegotiator {
    fn name(&self) -> &'static str {
        "cookie"
    }

    #[instrument(skip_all, fields(negotiator = "cookie"))]
    async fn ensure_valid(&self, exchange: &mut SessionExchange) -> Result<(), AuthError> {
        if self.is_logged_in(exchange) {
            return Ok(());
        }

        info!("Logging in to CareLink");
        let request = HttpRequest::post_form(
            endpoint(&self.base_url, SECURITY_CHECK_PATH),
            &[
                ("j_username", self.credentials.username()),
                ("j_password", self.credentials.password()),
                ("j_character_encoding", "UTF-8"),
            ],
        );
        let response = exchange.send(request).await?;
        ensure_accepted(LoginStep::SecurityCheck, &response)?;

        let response = exchange
            .send(HttpRequest::get(endpoint(&self.base_url, LOGIN_LANDING_PATH)))
            .await?;
        ensure_accepted(LoginStep::LoginLanding, &response)?;

        if !self.is_logged_in(exchange) {
            warn!("login completed without a session cookie");
            return Err(AuthError::InvalidCredentials);
        }
        info!("CareLink login succeeded");
        Ok(())
    }

    fn snapshot_url(&self, now: DateTime<Utc>) -> Url {
        snapshot_endpoint(&self.base_url, SNAPSHOT_PATH, now)
    }
}
