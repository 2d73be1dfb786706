// ABOUTME: Tests for the EU SSO login chain and bearer token refresh
// ABOUTME: Drives the negotiator against a scripted transport and inspects every request it sends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use carelink_client::transport::RequestBody;
use carelink_client::{create_negotiator, AuthError, LoginStep, SessionExchange};
use chrono::{Duration, SecondsFormat, Utc};
use common::{
    eu_config, init_test_logging, script_sso_login, Reply, ScriptedTransport, SSO_AUTHORIZE,
    SSO_LOGIN_PATH,
};
use reqwest::Method;

const FAR_FUTURE: &str = "2099-01-01T00:00:00.000Z";

fn expiring_in(minutes: i64) -> String {
    (Utc::now() + Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[tokio::test]
async fn test_full_login_chain() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", FAR_FUTURE);

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    negotiator.ensure_valid(&mut exchange).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);

    // S0
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(
        requests[0].url.as_str(),
        "https://carelink.minimed.eu/patient/sso/login?country=gb&lang=en"
    );

    // S1 follows the first Location verbatim
    assert_eq!(
        requests[1].url.as_str(),
        "https://mdtlogin.medtronic.com/mmcl/auth/oauth/v2/authorize?client_id=carelink"
    );

    // S2 -> S3: query discarded except locale and countrycode
    let credentials = &requests[2];
    assert_eq!(credentials.method, Method::POST);
    assert_eq!(credentials.url.path(), SSO_LOGIN_PATH);
    assert_eq!(credentials.url.query(), Some("locale=en&countrycode=gb"));
    assert_eq!(credentials.form_value("sessionID"), Some("login-sid"));
    assert_eq!(credentials.form_value("sessionData"), Some("login-data"));
    assert_eq!(credentials.form_value("locale"), Some("en"));
    assert_eq!(credentials.form_value("action"), Some("login"));
    assert_eq!(credentials.form_value("username"), Some("alice"));
    assert_eq!(credentials.form_value("password"), Some("correct horse"));
    assert_eq!(credentials.form_value("actionButton"), Some("Log in"));

    // S3 -> S4: scraped consent form
    let consent = &requests[3];
    assert_eq!(consent.url.path(), "/mmcl/auth/oauth/v2/authorize/consent");
    assert_eq!(consent.form_value("action"), Some("consent"));
    assert_eq!(consent.form_value("sessionID"), Some("consent-sid"));
    assert_eq!(consent.form_value("sessionData"), Some("consent-data"));
    assert_eq!(consent.form_value("response_type"), Some("code"));
    assert_eq!(consent.form_value("response_mode"), Some("query"));

    // S4 -> S5
    assert_eq!(requests[4].url.path(), "/patient/sso/login/callback");

    assert_eq!(exchange.store().bearer_token(), Some("token-1"));
    assert!(exchange.store().token_expiry().is_some());

    // Valid token with a distant expiry: nothing to do
    negotiator.ensure_valid(&mut exchange).await.unwrap();
    assert_eq!(transport.request_count(), 5);
}

#[tokio::test]
async fn test_invalid_credentials_stop_before_consent() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    transport.push(Reply::redirect(&format!("{SSO_AUTHORIZE}?client_id=carelink")));
    transport.push(Reply::redirect(&format!(
        "https://mdtlogin.medtronic.com{SSO_LOGIN_PATH}?sessionID=s&sessionData=d&locale=en&countrycode=gb"
    )));
    // The login form is served again instead of the consent page
    transport.push(Reply::ok().body(format!(
        r#"<form action="{SSO_LOGIN_PATH}?locale=en" method="POST"><p>Invalid username or password</p></form>"#
    )));

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    let error = negotiator.ensure_valid(&mut exchange).await.unwrap_err();

    assert!(matches!(error, AuthError::InvalidCredentials));
    assert_eq!(transport.request_count(), 3);
    assert!(exchange.store().bearer_token().is_none());
}

#[tokio::test]
async fn test_missing_session_data_is_protocol_error() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::redirect("https://mdtlogin.medtronic.com/authorize"));
    transport.push(Reply::redirect(
        "https://mdtlogin.medtronic.com/login?sessionID=s&locale=en&countrycode=gb",
    ));

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    let error = negotiator.ensure_valid(&mut exchange).await.unwrap_err();

    match error {
        AuthError::Protocol { step, detail } => {
            assert_eq!(step, LoginStep::SsoCredentials);
            assert!(detail.contains("sessionData"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_missing_location_is_protocol_error() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::status(302));

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    let error = negotiator.ensure_valid(&mut exchange).await.unwrap_err();
    assert!(matches!(
        error,
        AuthError::Protocol {
            step: LoginStep::SsoStart,
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_token_cookie_is_protocol_error() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::redirect(&format!("{SSO_AUTHORIZE}?client_id=carelink")));
    transport.push(Reply::redirect(&format!(
        "https://mdtlogin.medtronic.com{SSO_LOGIN_PATH}?sessionID=s&sessionData=d&locale=en&countrycode=gb"
    )));
    transport.push(Reply::ok().body(common::consent_page()));
    transport.push(Reply::redirect(
        "https://carelink.minimed.eu/patient/sso/login/callback?code=abc",
    ));
    transport.push(Reply::redirect("/patient/connect/overview"));

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    let error = negotiator.ensure_valid(&mut exchange).await.unwrap_err();
    match error {
        AuthError::Protocol { step, detail } => {
            assert_eq!(step, LoginStep::SsoCallback);
            assert!(detail.contains("auth_tmp_token"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_request_budget_caps_login() {
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "t", FAR_FUTURE);

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 4);
    let error = negotiator.ensure_valid(&mut exchange).await.unwrap_err();

    assert!(matches!(error, AuthError::RequestBudgetExceeded { limit: 4 }));
    assert_eq!(transport.request_count(), 4);
}

#[tokio::test]
async fn test_refresh_within_lead_window() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", &expiring_in(5));
    transport.push(
        Reply::ok()
            .cookie("auth_tmp_token=token-2; Path=/")
            .cookie(&format!("c_token_valid_to={FAR_FUTURE}; Path=/")),
    );

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    negotiator.ensure_valid(&mut exchange).await.unwrap();
    assert_eq!(exchange.store().bearer_token(), Some("token-1"));

    negotiator.ensure_valid(&mut exchange).await.unwrap();
    let requests = transport.requests();
    assert_eq!(requests.len(), 6);

    let refresh = &requests[5];
    assert_eq!(refresh.method, Method::POST);
    assert_eq!(refresh.url.as_str(), "https://carelink.minimed.eu/patient/sso/reauth");
    assert_eq!(refresh.header_value("Authorization"), Some("Bearer token-1"));
    assert_eq!(refresh.body, RequestBody::Json(serde_json::json!({})));

    assert_eq!(exchange.store().bearer_token(), Some("token-2"));
}

#[tokio::test]
async fn test_token_outside_lead_window_is_kept() {
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", &expiring_in(30));

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    negotiator.ensure_valid(&mut exchange).await.unwrap();
    negotiator.ensure_valid(&mut exchange).await.unwrap();
    assert_eq!(transport.request_count(), 5);
}

#[tokio::test]
async fn test_unparseable_expiry_is_valid_until_rejected() {
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", "whenever");

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    negotiator.ensure_valid(&mut exchange).await.unwrap();
    assert!(exchange.store().token_expiry().is_none());

    negotiator.ensure_valid(&mut exchange).await.unwrap();
    assert_eq!(transport.request_count(), 5);
}

#[tokio::test]
async fn test_rejected_refresh_falls_back_to_login() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", &expiring_in(1));
    transport.push(Reply::status(401));
    script_sso_login(&transport, "token-2", FAR_FUTURE);

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 20);
    negotiator.ensure_valid(&mut exchange).await.unwrap();
    negotiator.ensure_valid(&mut exchange).await.unwrap();

    assert_eq!(transport.request_count(), 11);
    assert_eq!(transport.count_path("/patient/sso/reauth"), 1);
    assert_eq!(transport.count_path("/patient/sso/login"), 2);
    // The second login starts from an empty store, so S0 carries no bearer
    assert_eq!(transport.requests()[6].header_value("Authorization"), None);
    assert_eq!(exchange.store().bearer_token(), Some("token-2"));
}

#[tokio::test]
async fn test_failed_refresh_propagates() {
    let transport = ScriptedTransport::new();
    script_sso_login(&transport, "token-1", &expiring_in(1));
    transport.push(Reply::status(503));

    let negotiator = create_negotiator(&eu_config());
    let mut exchange = SessionExchange::new(transport.clone(), 10);
    negotiator.ensure_valid(&mut exchange).await.unwrap();
    let error = negotiator.ensure_valid(&mut exchange).await.unwrap_err();
    assert!(matches!(
        error,
        AuthError::Rejected {
            step: LoginStep::TokenRefresh,
            ..
        }
    ));
}

#[test]
fn test_snapshot_url_uses_data_endpoint() {
    let negotiator = create_negotiator(&eu_config());
    let url = negotiator.snapshot_url(Utc::now());
    assert_eq!(url.path(), "/patient/connect/data");
    assert!(url
        .query()
        .unwrap()
        .starts_with("cpSerialNumber=NONE&msgType=last24hours&requestTime="));
}
