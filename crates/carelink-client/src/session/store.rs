// ABOUTME: Cookie jar, bearer token, and token expiry for one CareLink session
// ABOUTME: Records parsed Set-Cookie headers and produces Cookie headers scoped by domain, path, and expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use cookie::Cookie;
use url::Url;

/// One stored cookie
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    domain: String,
    host_only: bool,
    path: String,
    expires: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn domain_matches(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.domain)
            || (!self.host_only
                && host.len() > self.domain.len()
                && host.to_ascii_lowercase().ends_with(&format!(".{}", self.domain)))
    }

    fn path_matches(&self, request_path: &str) -> bool {
        request_path == self.path
            || (request_path.starts_with(&self.path)
                && (self.path.ends_with('/')
                    || request_path[self.path.len()..].starts_with('/')))
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    fn applies_to(&self, url: &Url, now: DateTime<Utc>) -> bool {
        url.host_str().is_some_and(|host| self.domain_matches(host))
            && self.path_matches(url.path())
            && !self.is_expired(now)
    }
}

impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .finish()
    }
}

/// Cookies and bearer token of one authenticated (or not yet authenticated) session
#[derive(Clone, Default)]
pub struct SessionStore {
    cookies: Vec<StoredCookie>,
    bearer_token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
}

impl SessionStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `Set-Cookie` header received from `url`.
    ///
    /// A cookie already expired at `now` deletes any stored cookie with the same
    /// name, domain and path. Malformed headers are ignored.
    pub fn record_set_cookie(&mut self, url: &Url, header: &str, now: DateTime<Utc>) {
        let Some(host) = url.host_str() else {
            return;
        };
        let Ok(parsed) = Cookie::parse(header) else {
            return;
        };
        let host = host.to_ascii_lowercase();

        // A Domain attribute the request host does not fall under is ignored
        let (domain, host_only) = match parsed
            .domain()
            .map(|domain| domain.trim_start_matches('.').to_ascii_lowercase())
        {
            Some(domain)
                if !domain.is_empty()
                    && (host == domain || host.ends_with(&format!(".{domain}"))) =>
            {
                (domain, false)
            }
            _ => (host, true),
        };
        let path = parsed
            .path()
            .filter(|path| path.starts_with('/'))
            .map_or_else(|| default_path(url), str::to_owned);
        let expires = match parsed.max_age() {
            Some(max_age) if max_age.is_positive() => TimeDelta::try_seconds(max_age.whole_seconds())
                .and_then(|lifetime| now.checked_add_signed(lifetime)),
            Some(_) => Some(DateTime::<Utc>::MIN_UTC),
            None => parsed
                .expires_datetime()
                .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), 0)),
        };

        let cookie = StoredCookie {
            name: parsed.name().to_owned(),
            value: parsed.value().trim_matches('"').to_owned(),
            domain,
            host_only,
            path,
            expires,
        };

        self.cookies.retain(|existing| {
            !(existing.name == cookie.name
                && existing.domain == cookie.domain
                && existing.path == cookie.path)
        });
        if !cookie.is_expired(now) {
            self.cookies.push(cookie);
        }
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies
    #[must_use]
    pub fn cookie_header(&self, url: &Url, now: DateTime<Utc>) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|cookie| cookie.applies_to(url, now))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Unexpired cookie with this name stored for exactly `host`
    #[must_use]
    pub fn cookie(&self, name: &str, host: &str, now: DateTime<Utc>) -> Option<&StoredCookie> {
        self.cookies.iter().find(|cookie| {
            cookie.name == name && cookie.domain.eq_ignore_ascii_case(host) && !cookie.is_expired(now)
        })
    }

    /// Whether [`cookie`](Self::cookie) finds a match
    #[must_use]
    pub fn has_cookie(&self, name: &str, host: &str, now: DateTime<Utc>) -> bool {
        self.cookie(name, host, now).is_some()
    }

    /// Current bearer token
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Expiry of the bearer token, if known
    #[must_use]
    pub const fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token_expiry
    }

    /// Replace the bearer token and its expiry
    pub fn set_bearer(&mut self, token: String, expiry: Option<DateTime<Utc>>) {
        self.bearer_token = Some(token);
        self.token_expiry = expiry;
    }

    /// Drop every cookie and the token
    pub fn clear(&mut self) {
        self.cookies.clear();
        self.bearer_token = None;
        self.token_expiry = None;
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.bearer_token.is_none()
    }

    /// Number of stored cookies
    #[must_use]
    pub fn cookie_count(&self) -> usize {
        self.cookies.len()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field(
                "cookies",
                &self.cookies.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            )
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_expiry", &self.token_expiry)
            .finish()
    }
}

/// Default cookie path: the request path up to, not including, its last `/`
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(index) => path[..index].to_owned(),
    }
}
