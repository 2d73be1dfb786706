// ABOUTME: Tests for retry-governed snapshot fetching
// ABOUTME: Covers session reset on 401, backoff timing, request budget, and terminal failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::time::Duration;

use carelink_client::{AuthError, DataFetcher, FetchError};
use chrono::{SecondsFormat, TimeDelta, Utc};
use common::{
    eu_config, init_test_logging, script_sso_login, script_us_login, snapshot_body, us_config,
    Reply, ScriptedTransport,
};
use tokio::time::Instant;

const SECURITY_CHECK: &str = "/patient/j_security_check";
const FAR_FUTURE: &str = "2099-01-01T00:00:00.000Z";

fn expiring_in(minutes: i64) -> String {
    (Utc::now() + TimeDelta::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[tokio::test(start_paused = true)]
async fn test_two_expired_sessions_then_success() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    for _ in 0..2 {
        script_us_login(&transport);
        transport.push(Reply::status(401));
    }
    script_us_login(&transport);
    transport.push(Reply::ok().body(snapshot_body()));

    let mut config = us_config();
    config.max_retry_duration = Duration::from_secs(15);
    let mut fetcher = DataFetcher::with_transport(&config, transport.clone());

    let started = Instant::now();
    let snapshot = fetcher.fetch().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(snapshot.sgs.len(), 1);
    assert_eq!(snapshot.medical_device_family, "PARADIGM");
    // Each 401 cleared the session, forcing a fresh login on the next attempt
    assert_eq!(transport.count_path(SECURITY_CHECK), 3);
    assert_eq!(transport.request_count(), 9);
    assert_eq!(fetcher.requests_made(), 9);
    // 2 s after attempt 1, 4 s after attempt 2
    assert!(elapsed >= Duration::from_secs(6), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_request_budget_aborts_without_further_retries() {
    let transport = ScriptedTransport::new();
    script_us_login(&transport);
    transport.push(Reply::status(401));
    script_us_login(&transport);
    transport.push(Reply::ok().body(snapshot_body()));

    let mut config = us_config();
    config.max_requests_per_fetch = 4;
    let mut fetcher = DataFetcher::with_transport(&config, transport.clone());

    let error = fetcher.fetch().await.unwrap_err();
    assert!(matches!(error, FetchError::RequestBudgetExceeded { limit: 4 }));
    assert!(!error.is_retryable());
    assert_eq!(transport.request_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_budget_resets_between_fetches() {
    let transport = ScriptedTransport::new();
    script_us_login(&transport);
    transport.push(Reply::ok().body(snapshot_body()));
    transport.push(Reply::ok().body(snapshot_body()));

    let mut config = us_config();
    config.max_requests_per_fetch = 3;
    let mut fetcher = DataFetcher::with_transport(&config, transport.clone());

    fetcher.fetch().await.unwrap();
    assert_eq!(fetcher.requests_made(), 3);
    fetcher.fetch().await.unwrap();
    assert_eq!(fetcher.requests_made(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_after_retry_bound() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    script_us_login(&transport);
    transport.push(Reply::status(500));
    transport.push(Reply::status(502));

    let mut config = us_config();
    config.max_retry_duration = Duration::from_secs(3);
    let mut fetcher = DataFetcher::with_transport(&config, transport.clone());

    let started = Instant::now();
    let error = fetcher.fetch().await.unwrap_err();

    match &error {
        FetchError::Exhausted {
            attempts,
            diagnostic,
            last,
        } => {
            assert_eq!(*attempts, 2);
            assert!(diagnostic.contains("502"), "diagnostic: {diagnostic}");
            assert!(matches!(**last, FetchError::Status { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Server errors do not invalidate the session
    assert_eq!(transport.count_path(SECURITY_CHECK), 1);
    assert_eq!(started.elapsed().as_secs(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_small_bound_surfaces_first_failure() {
    let transport = ScriptedTransport::new();
    script_us_login(&transport);
    transport.push(Reply::ok().body("<html>maintenance</html>"));

    let mut config = us_config();
    config.max_retry_duration = Duration::from_secs(1);
    let mut fetcher = DataFetcher::with_transport(&config, transport.clone());

    let error = fetcher.fetch().await.unwrap_err();
    match error {
        FetchError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*last, FetchError::Decode { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_credentials_not_retried() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::ok());
    transport.push(Reply::ok());

    let mut fetcher = DataFetcher::with_transport(&us_config(), transport.clone());
    let started = Instant::now();
    let error = fetcher.fetch().await.unwrap_err();

    assert!(matches!(
        error,
        FetchError::Auth(AuthError::InvalidCredentials)
    ));
    assert_eq!(transport.request_count(), 2);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(fetcher.session().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_retried() {
    let transport = ScriptedTransport::new();
    script_us_login(&transport);
    // The third request finds no scripted reply and fails at the transport
    let mut config = us_config();
    config.max_retry_duration = Duration::from_secs(2);
    let mut fetcher = DataFetcher::with_transport(&config, transport.clone());

    let error = fetcher.fetch().await.unwrap_err();
    match error {
        FetchError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, FetchError::Transport(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_eu_snapshot_carries_bearer_token() {
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", "2099-01-01T00:00:00.000Z");
    transport.push(Reply::ok().body(snapshot_body()));

    let mut fetcher = DataFetcher::with_transport(&eu_config(), transport.clone());
    fetcher.fetch().await.unwrap();

    let requests = transport.requests();
    let snapshot = requests.last().unwrap();
    assert_eq!(snapshot.url.path(), "/patient/connect/data");
    assert_eq!(snapshot.header_value("Authorization"), Some("Bearer token-1"));
    assert_eq!(fetcher.session().bearer_token(), Some("token-1"));
}

#[tokio::test(start_paused = true)]
async fn test_eu_rejected_refresh_and_expired_snapshot_recover_within_default_budget() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", &expiring_in(1));
    transport.push(Reply::ok().body(snapshot_body()));
    // Second fetch: refresh rejected, fresh login, snapshot 401, login again
    transport.push(Reply::status(401));
    script_sso_login(&transport, "token-2", FAR_FUTURE);
    transport.push(Reply::status(401));
    script_sso_login(&transport, "token-3", FAR_FUTURE);
    transport.push(Reply::ok().body(snapshot_body()));

    let mut fetcher = DataFetcher::with_transport(&eu_config(), transport.clone());
    fetcher.fetch().await.unwrap();
    fetcher.fetch().await.unwrap();

    assert_eq!(fetcher.requests_made(), 13);
    assert_eq!(transport.remaining(), 0);
    let requests = transport.requests();
    assert_eq!(requests[6].url.path(), "/patient/sso/reauth");
    // Each login after a rejection starts from an empty store
    for index in [7, 13] {
        assert_eq!(requests[index].url.path(), "/patient/sso/login");
        assert_eq!(requests[index].header_value("Authorization"), None);
    }
    let snapshot = requests.last().unwrap();
    assert_eq!(snapshot.url.path(), "/patient/connect/data");
    assert_eq!(snapshot.header_value("Authorization"), Some("Bearer token-3"));
    assert_eq!(fetcher.session().bearer_token(), Some("token-3"));
}
