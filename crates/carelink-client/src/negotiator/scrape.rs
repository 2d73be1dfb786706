// ABOUTME: HTML scraping for the SSO consent page
// ABOUTME: Extracts the POST form action and hidden session inputs with fixed patterns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::LazyLock;

use regex::Regex;

static FORM_ACTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // <form action="https://..." method="POST"
    Regex::new(r#"(?i)<form\s+action="([^"]*)"\s+method="POST""#).ok()
});

static HIDDEN_INPUT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input\s+type="hidden"\s+name="([^"]+)"\s+value="([^"]*)""#).ok()
});

/// Fields of the consent form the SSO login posts back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentForm {
    /// Form `action`, possibly relative
    pub action: String,
    /// Hidden `sessionID`
    pub session_id: Option<String>,
    /// Hidden `sessionData`
    pub session_data: Option<String>,
}

/// First POST form action in the page, entity-decoded
#[must_use]
pub fn form_action(html: &str) -> Option<String> {
    let captures = FORM_ACTION.as_ref()?.captures(html)?;
    Some(html_escape::decode_html_entities(captures.get(1)?.as_str()).into_owned())
}

/// Value of the first hidden input named `name`, entity-decoded
#[must_use]
pub fn hidden_input(html: &str, name: &str) -> Option<String> {
    HIDDEN_INPUT
        .as_ref()?
        .captures_iter(html)
        .find(|captures| captures.get(1).is_some_and(|m| m.as_str() == name))
        .and_then(|captures| captures.get(2))
        .map(|value| html_escape::decode_html_entities(value.as_str()).into_owned())
}

/// Scrape the consent form; `None` when the page has no POST form
#[must_use]
pub fn consent_form(html: &str) -> Option<ConsentForm> {
    Some(ConsentForm {
        action: form_action(html)?,
        session_id: hidden_input(html, "sessionID"),
        session_data: hidden_input(html, "sessionData"),
    })
}
