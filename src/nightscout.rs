// ABOUTME: Nightscout REST uploader authenticated with the SHA-1 digest of the API secret
// ABOUTME: Event sink seam so the poll loop can upload for real or only log in dry-run mode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::errors::UploadError;

/// Request header carrying the hashed secret
pub const API_SECRET_HEADER: &str = "api-secret";

/// Longest response body kept in an error
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Nightscout collections the bridge writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Sensor glucose values
    Entries,
    /// Pump and uploader state
    DeviceStatus,
    /// Meals, boluses and finger-stick checks
    Treatments,
}

impl Collection {
    /// API path relative to the site root
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Entries => "api/v1/entries.json",
            Self::DeviceStatus => "api/v1/devicestatus.json",
            Self::Treatments => "api/v1/treatments.json",
        }
    }

    /// Collection name as Nightscout spells it
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Entries => "entries",
            Self::DeviceStatus => "devicestatus",
            Self::Treatments => "treatments",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hex SHA-1 of the API secret, as Nightscout expects it
#[must_use]
pub fn api_secret_digest(secret: &str) -> String {
    hex::encode(digest(&SHA1_FOR_LEGACY_USE_ONLY, secret.as_bytes()))
}

/// Serialize events into the JSON array body of an upload
///
/// # Errors
///
/// Returns [`UploadError::Encode`] if an event fails to serialize
pub fn to_payload<T: Serialize>(
    collection: Collection,
    events: &[T],
) -> Result<Vec<Value>, UploadError> {
    events
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()
        .map_err(|source| UploadError::Encode {
            collection: collection.name(),
            source,
        })
}

/// Serialize and hand `events` to `sink`; an empty batch is skipped without a request
///
/// # Errors
///
/// Returns an error if encoding fails or the sink rejects the batch
pub async fn upload_batch<T: Serialize + Sync>(
    sink: &dyn EventSink,
    collection: Collection,
    events: &[T],
) -> Result<usize, UploadError> {
    if events.is_empty() {
        info!(collection = %collection, "No new items to upload");
        return Ok(0);
    }
    let payload = to_payload(collection, events)?;
    sink.send(collection, payload).await
}

/// Destination for normalized events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one non-empty batch, returning how many documents were accepted
    async fn send(&self, collection: Collection, payload: Vec<Value>) -> Result<usize, UploadError>;
}

/// Nightscout REST client
#[derive(Clone)]
pub struct NightscoutClient {
    http: Client,
    base_url: Url,
    secret_digest: String,
}

impl fmt::Debug for NightscoutClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NightscoutClient")
            .field("base_url", &self.base_url.as_str())
            .field("secret_digest", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl NightscoutClient {
    /// Create a client for the site at `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: Url, api_secret: &str, timeout: Duration) -> Result<Self, UploadError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UploadError::Client)?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            secret_digest: api_secret_digest(api_secret),
        })
    }

    /// Site root every endpoint is resolved against
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute endpoint URL for a collection
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto the base URL
    pub fn endpoint(&self, collection: Collection) -> Result<Url, UploadError> {
        self.base_url
            .join(collection.path())
            .map_err(|source| UploadError::Endpoint {
                path: collection.path(),
                source,
            })
    }
}

#[async_trait]
impl EventSink for NightscoutClient {
    #[instrument(skip(self, payload), fields(collection = %collection, count = payload.len()))]
    async fn send(&self, collection: Collection, payload: Vec<Value>) -> Result<usize, UploadError> {
        let url = self.endpoint(collection)?;
        let count = payload.len();
        debug!(url = %url, "POST batch");

        let response = self
            .http
            .post(url.clone())
            .header(API_SECRET_HEADER, &self.secret_digest)
            .json(&payload)
            .send()
            .await
            .map_err(|source| UploadError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status {
                url: url.to_string(),
                status,
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        info!(status = status.as_u16(), "Uploaded {count} {collection} document(s)");
        Ok(count)
    }
}

/// Sink that logs what would be uploaded
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSink;

#[async_trait]
impl EventSink for DryRunSink {
    async fn send(&self, collection: Collection, payload: Vec<Value>) -> Result<usize, UploadError> {
        let count = payload.len();
        info!(
            collection = %collection,
            count,
            payload = %serde_json::Value::Array(payload),
            "Dry run, not uploading"
        );
        Ok(count)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
