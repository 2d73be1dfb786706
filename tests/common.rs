// ABOUTME: Shared helpers for bridge integration tests
// ABOUTME: Fixture loading, a scripted CareLink transport, and a sink that records uploads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `carelink_bridge`

use std::collections::VecDeque;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use carelink_bridge::{Collection, EventSink, UploadError};
use carelink_client::{
    ClientConfig, Credentials, HttpRequest, HttpResponse, HttpTransport, Region, TransportError,
};
use carelink_core::Snapshot;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::Level;
use url::Url;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Raw fixture text
pub fn fixture_text(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).unwrap()
}

/// Parsed fixture snapshot
pub fn fixture(name: &str) -> Snapshot {
    serde_json::from_str(&fixture_text(name)).unwrap()
}

/// One canned reply
#[derive(Debug, Clone, Default)]
pub struct Reply {
    status: u16,
    location: Option<String>,
    cookie: Option<String>,
    body: String,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::status(200)
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            location: Some(location.to_owned()),
            ..Self::status(302)
        }
    }

    pub fn cookie(mut self, cookie: &str) -> Self {
        self.cookie = Some(cookie.to_owned());
        self
    }
}

/// Transport answering requests in script order
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Successful US cookie login
    pub fn script_login(&self) {
        self.push(Reply::redirect("/patient/main/login.do"));
        self.push(
            Reply::ok("").cookie("_WL_AUTHCOOKIE_JSESSIONID=session-1; Path=/; Secure; HttpOnly"),
        );
    }

    pub fn request_count(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        *self.requests.lock().unwrap() += 1;
        let Some(reply) = self.replies.lock().unwrap().pop_front() else {
            return Err(TransportError::Connection {
                url: url.to_string(),
                reason: "no scripted reply left".to_owned(),
            });
        };
        let mut response = HttpResponse::new(StatusCode::from_u16(reply.status).unwrap(), url)
            .with_body(reply.body);
        if let Some(location) = &reply.location {
            response = response.with_header("Location", location);
        }
        if let Some(cookie) = &reply.cookie {
            response = response.with_header("Set-Cookie", cookie);
        }
        Ok(response)
    }
}

pub fn us_config() -> ClientConfig {
    ClientConfig::new(
        Region::Us,
        Url::parse("https://carelink.minimed.com/").unwrap(),
        Credentials::new("alice", "correct horse"),
    )
}

/// Sink keeping every batch it receives; clones share the record
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<(Collection, Vec<Value>)>>>,
    failing: Option<Collection>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink rejecting every batch for `collection`
    pub fn failing(collection: Collection) -> Self {
        Self {
            failing: Some(collection),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<(Collection, Vec<Value>)> {
        self.batches.lock().unwrap().clone()
    }

    pub fn documents(&self, collection: Collection) -> Vec<Value> {
        self.batches()
            .into_iter()
            .filter(|(c, _)| *c == collection)
            .flat_map(|(_, payload)| payload)
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, collection: Collection, payload: Vec<Value>) -> Result<usize, UploadError> {
        if self.failing == Some(collection) {
            return Err(UploadError::Status {
                url: format!("https://ns.example.org/{}", collection.path()),
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "maintenance".to_owned(),
            });
        }
        let count = payload.len();
        self.batches.lock().unwrap().push((collection, payload));
        Ok(count)
    }
}
