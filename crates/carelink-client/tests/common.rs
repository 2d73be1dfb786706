// ABOUTME: Shared helpers for carelink-client integration tests
// ABOUTME: Scripted in-memory transport that replays canned responses and records requests
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
//! Shared test utilities for `carelink_client`

use std::collections::VecDeque;
use std::env;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use carelink_client::{
    ClientConfig, Credentials, HttpRequest, HttpResponse, HttpTransport, Region, TransportError,
};
use reqwest::StatusCode;
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

/// One canned reply; the URL is taken from the request it answers
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn redirect(location: &str) -> Self {
        Self::status(302).header("Location", location)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn cookie(self, cookie: &str) -> Self {
        self.header("Set-Cookie", cookie)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// In-memory transport answering requests in script order
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn count_path(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == path)
            .count()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        let Some(reply) = self.replies.lock().unwrap().pop_front() else {
            return Err(TransportError::Connection {
                url: url.to_string(),
                reason: "no scripted reply left".to_owned(),
            });
        };
        let mut response = HttpResponse::new(reply.status, url).with_body(reply.body);
        for (name, value) in &reply.headers {
            response = response.with_header(name, value);
        }
        Ok(response)
    }
}

pub const US_PORTAL: &str = "https://carelink.minimed.com/";
pub const EU_PORTAL: &str = "https://carelink.minimed.eu/";

pub fn us_config() -> ClientConfig {
    ClientConfig::new(
        Region::Us,
        Url::parse(US_PORTAL).unwrap(),
        Credentials::new("alice", "correct horse"),
    )
}

pub fn eu_config() -> ClientConfig {
    ClientConfig::new(
        Region::Eu,
        Url::parse(EU_PORTAL).unwrap(),
        Credentials::new("alice", "correct horse"),
    )
}

/// Script a successful US login (credential POST, landing page with cookie)
pub fn script_us_login(transport: &ScriptedTransport) {
    transport.push(Reply::redirect("/patient/main/login.do"));
    transport.push(Reply::ok().cookie("_WL_AUTHCOOKIE_JSESSIONID=session-1; Path=/; Secure; HttpOnly"));
}

pub const SSO_AUTHORIZE: &str = "https://mdtlogin.medtronic.com/mmcl/auth/oauth/v2/authorize";
pub const SSO_LOGIN_PATH: &str = "/mmcl/auth/oauth/v2/authorize/login";

pub fn consent_page() -> String {
    r#"<html><body>
        <form action="https://mdtlogin.medtronic.com/mmcl/auth/oauth/v2/authorize/consent" method="POST">
          <input type="hidden" name="sessionID" value="consent-sid">
          <input type="hidden" name="sessionData" value="consent-data">
          <input type="submit" name="action" value="Allow">
        </form>
    </body></html>"#
        .to_owned()
}

/// Script a successful EU SSO login ending with the given token cookies
pub fn script_sso_login(transport: &ScriptedTransport, token: &str, valid_to: &str) {
    transport.push(Reply::redirect(&format!("{SSO_AUTHORIZE}?client_id=carelink")));
    transport.push(Reply::redirect(&format!(
        "https://mdtlogin.medtronic.com{SSO_LOGIN_PATH}?sessionID=login-sid&sessionData=login-data&locale=en&countrycode=gb&extra=1"
    )));
    transport.push(Reply::ok().body(consent_page()));
    transport.push(Reply::redirect(
        "https://carelink.minimed.eu/patient/sso/login/callback?code=abc",
    ));
    transport.push(
        Reply::redirect("/patient/connect/overview")
            .cookie(&format!("auth_tmp_token={token}; Path=/; Secure"))
            .cookie(&format!("c_token_valid_to={valid_to}; Path=/")),
    );
}

pub fn snapshot_body() -> String {
    serde_json::json!({
        "currentServerTime": 1_445_268_224_137_i64,
        "lastMedicalDeviceDataUpdateServerTime": 1_445_267_870_381_i64,
        "sMedicalDeviceTime": "Oct 19, 2015 08:20:00",
        "medicalDeviceFamily": "PARADIGM",
        "lastSGTrend": "NONE",
        "sgs": [{ "sg": 70, "kind": "SG", "datetime": "Oct 19, 2015 07:55:00" }]
    })
    .to_string()
}
