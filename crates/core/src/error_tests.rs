// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

// --- classification ---

#[parameterized(
    timeout_408 = { 408 },
    rate_limit_429 = { 429 },
    internal_500 = { 500 },
    bad_gateway_502 = { 502 },
    unavailable_503 = { 503 },
    gateway_timeout_504 = { 504 },
)]
fn transient_statuses_retry(status: u16) {
    let err = StoreError::Api { status, message: "boom".into() };
    assert!(err.is_retryable());
}

#[parameterized(
    bad_request_400 = { 400 },
    not_found_404 = { 404 },
    gone_410 = { 410 },
    teapot_418 = { 418 },
)]
fn other_4xx_bails(status: u16) {
    let err = StoreError::Api { status, message: "no".into() };
    assert!(!err.is_retryable());
}

#[test]
fn network_codes_retry() {
    for code in RETRYABLE_NETWORK_CODES {
        let err = StoreError::Network { code: code.to_string() };
        assert!(err.is_retryable(), "{code} should retry");
    }
    assert!(StoreError::Network { code: "econnreset".into() }.is_retryable());
    assert!(!StoreError::Network { code: "EACCES".into() }.is_retryable());
}

#[test]
fn timeout_retries() {
    assert!(StoreError::Timeout.is_retryable());
}

#[test]
fn behavioral_errors_never_retry() {
    assert!(!StoreError::terminal("run", "run-a").is_retryable());
    assert!(!StoreError::not_found("hook", "h").is_retryable());
    assert!(!StoreError::validation("bad").is_retryable());
    assert!(!StoreError::UnsupportedVersion { run: 9, runtime: 3 }.is_retryable());
}

#[test]
fn status_mapping() {
    assert_eq!(StoreError::terminal("run", "run-a").status(), Some(410));
    assert_eq!(StoreError::not_found("run", "run-a").status(), Some(404));
    assert_eq!(StoreError::validation("bad").status(), Some(400));
    assert_eq!(StoreError::Api { status: 503, message: String::new() }.status(), Some(503));
    assert_eq!(StoreError::Timeout.status(), None);
}

// --- ErrorValue coercion ---

#[test]
fn error_value_structured_round_trip() {
    let err = ErrorValue {
        message: "boom".into(),
        stack: Some("at add (app.rs:3)".into()),
        code: Some("E_BOOM".into()),
    };
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["message"], "boom");
    let back: ErrorValue = serde_json::from_value(json).unwrap();
    assert_eq!(back, err);
}

#[test]
fn error_value_omits_empty_optionals() {
    let json = serde_json::to_value(ErrorValue::new("boom")).unwrap();
    assert_eq!(json, serde_json::json!({"message": "boom"}));
}

#[parameterized(
    bare_string = { serde_json::json!("boom"), "boom", None, None },
    legacy_error_key = { serde_json::json!({"error": "boom", "trace": "tb"}), "boom", Some("tb"), None },
    legacy_msg_key = { serde_json::json!({"msg": "boom", "name": "TypeError"}), "boom", None, Some("TypeError") },
    modern = { serde_json::json!({"message": "boom", "stack": "s", "code": "c"}), "boom", Some("s"), Some("c") },
)]
fn error_value_coerces_legacy_variants(
    raw: serde_json::Value,
    message: &str,
    stack: Option<&str>,
    code: Option<&str>,
) {
    let parsed: ErrorValue = serde_json::from_value(raw).unwrap();
    assert_eq!(parsed.message, message);
    assert_eq!(parsed.stack.as_deref(), stack);
    assert_eq!(parsed.code.as_deref(), code);
}

#[test]
fn store_error_converts_with_code() {
    let value = ErrorValue::from(&StoreError::Timeout);
    assert_eq!(value.code.as_deref(), Some("timeout"));
    assert!(!value.message.is_empty());
}
