// ABOUTME: Error types for session negotiation and snapshot fetching
// ABOUTME: AuthError covers login and refresh, FetchError covers one fetch call including retries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::error::Error as StdError;
use std::fmt::{self, Write as _};

use reqwest::StatusCode;

use crate::session::ExchangeError;
use crate::transport::TransportError;

/// Login and refresh steps, used to locate protocol failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// US credential POST
    SecurityCheck,
    /// US landing page that issues the login cookie
    LoginLanding,
    /// EU S0: SSO entry point
    SsoStart,
    /// EU S1: first redirect hop
    SsoRedirect,
    /// EU S2 to S3: credential form POST
    SsoCredentials,
    /// EU S3 to S4: consent form POST
    SsoConsent,
    /// EU S4 to S5: authorization callback
    SsoCallback,
    /// EU bearer token refresh
    TokenRefresh,
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SecurityCheck => "security check",
            Self::LoginLanding => "login landing",
            Self::SsoStart => "sso start (S0)",
            Self::SsoRedirect => "sso redirect (S1)",
            Self::SsoCredentials => "sso credentials (S2)",
            Self::SsoConsent => "sso consent (S3)",
            Self::SsoCallback => "sso callback (S4)",
            Self::TokenRefresh => "token refresh",
        };
        f.write_str(label)
    }
}

/// Session negotiation failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// An expected header, query parameter, form field or cookie was missing
    #[error("login protocol error at {step}: {detail}")]
    Protocol {
        /// Step that failed
        step: LoginStep,
        /// What was missing
        detail: String,
    },

    /// The vendor rejected the username or password
    #[error("CareLink rejected the username or password")]
    InvalidCredentials,

    /// A login request returned neither success nor a redirect
    #[error("login rejected at {step} with HTTP {status}")]
    Rejected {
        /// Step that failed
        step: LoginStep,
        /// Response status
        status: StatusCode,
    },

    /// Network failure during login
    #[error("transport failure during login")]
    Transport(#[source] TransportError),

    /// The per-fetch request cap was reached during login
    #[error("request budget of {limit} requests exhausted during login")]
    RequestBudgetExceeded {
        /// Configured cap
        limit: u32,
    },
}

impl AuthError {
    /// Protocol error helper
    pub fn protocol(step: LoginStep, detail: impl Into<String>) -> Self {
        Self::Protocol {
            step,
            detail: detail.into(),
        }
    }
}

impl From<ExchangeError> for AuthError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::RequestBudgetExceeded { limit } => Self::RequestBudgetExceeded { limit },
            ExchangeError::Transport(source) => Self::Transport(source),
        }
    }
}

/// Failures of [`DataFetcher::fetch`](crate::fetcher::DataFetcher::fetch)
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Session negotiation failed
    #[error("authentication failed")]
    Auth(#[source] AuthError),

    /// The snapshot endpoint answered 401
    #[error("session expired while fetching {url}")]
    AuthExpired {
        /// Snapshot URL without query
        url: String,
    },

    /// The per-fetch request cap was reached
    #[error("request budget of {limit} requests exhausted")]
    RequestBudgetExceeded {
        /// Configured cap
        limit: u32,
    },

    /// The snapshot endpoint answered with an unexpected status
    #[error("snapshot request to {url} returned HTTP {status}")]
    Status {
        /// Response status
        status: StatusCode,
        /// Snapshot URL without query
        url: String,
    },

    /// Network failure on the snapshot request
    #[error("transport failure while fetching snapshot")]
    Transport(#[source] TransportError),

    /// The snapshot body was not valid JSON for the expected schema
    #[error("snapshot from {url} could not be decoded")]
    Decode {
        /// Snapshot URL without query
        url: String,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// Every attempt failed within the retry bound
    #[error("CareLink fetch failed after {attempts} attempt(s): {diagnostic}")]
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Last error and its source chain, formatted
        diagnostic: String,
        /// Last error
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt within the same fetch may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Auth(
                AuthError::Protocol { .. }
                    | AuthError::InvalidCredentials
                    | AuthError::RequestBudgetExceeded { .. }
            ) | Self::RequestBudgetExceeded { .. }
                | Self::Exhausted { .. }
        )
    }

    /// Whether the failure means the session must be discarded
    #[must_use]
    pub const fn invalidates_session(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::AuthExpired { .. })
    }
}

impl From<AuthError> for FetchError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::RequestBudgetExceeded { limit } => Self::RequestBudgetExceeded { limit },
            other => Self::Auth(other),
        }
    }
}

impl From<ExchangeError> for FetchError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::RequestBudgetExceeded { limit } => Self::RequestBudgetExceeded { limit },
            ExchangeError::Transport(source) => Self::Transport(source),
        }
    }
}

/// Format an error followed by every error in its source chain
#[must_use]
pub fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, ": {cause}");
        source = cause.source();
    }
    rendered
}
