// ABOUTME: Retry-governed snapshot acquisition on top of a session negotiator
// ABOUTME: Enforces the per-fetch request budget and clears the session on authentication failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Duration;

use carelink_core::Snapshot;
use chrono::Utc;
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ClientConfig;
use crate::errors::{error_chain, FetchError};
use crate::negotiator::{create_negotiator, SessionNegotiator};
use crate::retry::RetryPolicy;
use crate::session::{SessionExchange, SessionStore};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport, TransportError};

/// Fetches vendor snapshots for one account
pub struct DataFetcher {
    negotiator: Box<dyn SessionNegotiator>,
    exchange: SessionExchange,
    policy: RetryPolicy,
}

impl DataFetcher {
    /// Assemble a fetcher from its parts
    #[must_use]
    pub fn new(
        negotiator: Box<dyn SessionNegotiator>,
        transport: Arc<dyn HttpTransport>,
        request_limit: u32,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            negotiator,
            exchange: SessionExchange::new(transport, request_limit),
            policy,
        }
    }

    /// Fetcher for `config` over the given transport
    #[must_use]
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(
            create_negotiator(config),
            transport,
            config.max_requests_per_fetch,
            RetryPolicy::new(config.max_retry_duration),
        )
    }

    /// Fetcher for `config` over HTTPS
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Current session state
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        self.exchange.store()
    }

    /// Requests sent during the most recent fetch
    #[must_use]
    pub const fn requests_made(&self) -> u32 {
        self.exchange.requests_made()
    }

    /// Fetch the latest snapshot, logging in and retrying as needed.
    ///
    /// # Errors
    ///
    /// Returns the error directly when it cannot be fixed by retrying
    /// (invalid credentials, login protocol drift, request budget), otherwise
    /// [`FetchError::Exhausted`] once the retry bound is reached.
    #[instrument(skip(self), fields(negotiator = self.negotiator.name()))]
    pub async fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        self.exchange.reset_budget();
        let mut attempt: u32 = 0;
        let mut slept = Duration::ZERO;

        loop {
            attempt += 1;
            let failure = match self.attempt().await {
                Ok(snapshot) => {
                    info!(
                        attempt,
                        requests = self.exchange.requests_made(),
                        "CareLink snapshot fetched"
                    );
                    return Ok(snapshot);
                }
                Err(failure) => failure,
            };

            if failure.invalidates_session() {
                debug!("clearing session after authentication failure");
                self.exchange.store_mut().clear();
            }
            if !failure.is_retryable() {
                error!(attempt, error = %error_chain(&failure), "CareLink fetch failed");
                return Err(failure);
            }

            let Some(delay) = self.policy.next_delay(attempt, slept) else {
                let diagnostic = error_chain(&failure);
                error!(attempts = attempt, %diagnostic, "giving up on CareLink fetch");
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    diagnostic,
                    last: Box::new(failure),
                });
            };

            warn!(
                attempt,
                delay_secs = delay.as_secs(),
                error = %failure,
                "CareLink fetch attempt failed, retrying"
            );
            sleep(delay).await;
            slept += delay;
        }
    }

    async fn attempt(&mut self) -> Result<Snapshot, FetchError> {
        self.negotiator.ensure_valid(&mut self.exchange).await?;

        let url = self.negotiator.snapshot_url(Utc::now());
        let mut label = url.clone();
        label.set_query(None);
        let label = label.to_string();

        debug!(url = %label, "requesting snapshot");
        let response = self.exchange.send(HttpRequest::get(url)).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::AuthExpired { url: label });
        }
        if !response.status.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                url: label,
            });
        }
        serde_json::from_str(&response.body).map_err(|source| FetchError::Decode { url: label, source })
    }
}
