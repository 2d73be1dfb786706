// ABOUTME: Sends requests on behalf of one session, attaching cookies and the bearer token
// ABOUTME: Records Set-Cookie responses and enforces the per-fetch request budget
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::store::SessionStore;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Failures of a single exchange
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The request counter reached its cap for this fetch
    #[error("request budget of {limit} requests exhausted")]
    RequestBudgetExceeded {
        /// Configured cap
        limit: u32,
    },

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Owns the session store and funnels every outbound request through it
pub struct SessionExchange {
    transport: Arc<dyn HttpTransport>,
    store: SessionStore,
    requests_made: u32,
    request_limit: u32,
}

impl SessionExchange {
    /// Create an exchange with an empty store
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, request_limit: u32) -> Self {
        Self {
            transport,
            store: SessionStore::new(),
            requests_made: 0,
            request_limit,
        }
    }

    /// Start a new budget window
    pub fn reset_budget(&mut self) {
        self.requests_made = 0;
    }

    /// Requests sent since the last reset
    #[must_use]
    pub const fn requests_made(&self) -> u32 {
        self.requests_made
    }

    /// Configured request cap
    #[must_use]
    pub const fn request_limit(&self) -> u32 {
        self.request_limit
    }

    /// Session state
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Mutable session state
    pub fn store_mut(&mut self) -> &mut SessionStore {
        &mut self.store
    }

    /// Send a request with session credentials attached.
    ///
    /// Cookies matching the URL and, when present, `Authorization: Bearer` are
    /// added unless the request already sets those headers.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::RequestBudgetExceeded`] without sending once the
    /// cap is reached, or the transport error.
    #[instrument(skip_all, fields(method = %request.method, path = request.url.path()))]
    pub async fn send(&mut self, mut request: HttpRequest) -> Result<HttpResponse, ExchangeError> {
        if self.requests_made >= self.request_limit {
            warn!(limit = self.request_limit, "request budget exhausted");
            return Err(ExchangeError::RequestBudgetExceeded {
                limit: self.request_limit,
            });
        }
        self.requests_made += 1;

        let now = Utc::now();
        if request.header_value("cookie").is_none() {
            if let Some(cookies) = self.store.cookie_header(&request.url, now) {
                request = request.header("Cookie", cookies);
            }
        }
        if request.header_value("authorization").is_none() {
            if let Some(token) = self.store.bearer_token() {
                request = request.header("Authorization", format!("Bearer {token}"));
            }
        }

        let response = self.transport.execute(request).await?;
        for header in response.set_cookies() {
            self.store.record_set_cookie(&response.url, header, now);
        }
        debug!(
            status = response.status.as_u16(),
            request = self.requests_made,
            "exchange complete"
        );
        Ok(response)
    }
}
