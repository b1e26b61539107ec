// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use chat_admission::AdmissionConfig;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::common::{browser_request, chat_request, json_body, TestApp};

fn quota_config(max: u32) -> AdmissionConfig {
    AdmissionConfig {
        max_conversations_per_session: max,
        max_requests_per_minute: 100,
        max_requests_per_hour: 1000,
        ban_threshold: 1000,
        ..AdmissionConfig::default()
    }
}

#[tokio::test]
async fn test_chat_reports_quota_usage() {
    let app = TestApp::new(quota_config(10));

    let response = app.send(chat_request(Some("session-1"), "book room A")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["response"], "echo: book room A");
    assert_eq!(body["usedCount"], 1);
    assert_eq!(body["remainingCount"], 9);
    assert_eq!(body["maxCount"], 10);
    assert_eq!(body["sessionId"], "session-1");
}

#[tokio::test]
async fn test_missing_session_header_gets_generated_id() {
    let app = TestApp::new(quota_config(10));

    let body = json_body(app.send(chat_request(None, "hello")).await).await;
    let session_id = body["sessionId"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(session_id).is_ok());
    assert_eq!(body["usedCount"], 1);
}

#[tokio::test]
async fn test_exhausted_session_is_refused() {
    let app = TestApp::new(quota_config(2));
    for _ in 0..2 {
        let response = app.send(chat_request(Some("s"), "hi")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.send(chat_request(Some("s"), "hi")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["sessionExpired"], true);
    assert_eq!(body["remainingCount"], 0);
    assert_eq!(app.backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(app.state.metrics.decision_count("quota_exceeded"), 1);
}

#[tokio::test]
async fn test_backend_failure_consumes_no_quota() {
    let app = TestApp::new(quota_config(3));
    app.backend.fail.store(true, Ordering::SeqCst);

    let response = app.send(chat_request(Some("s"), "hi")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert!(!body["message"].as_str().unwrap().contains("model loading"));
    assert_eq!(app.state.quotas.used_count("s"), 0);

    app.backend.fail.store(false, Ordering::SeqCst);
    let body = json_body(app.send(chat_request(Some("s"), "hi")).await).await;
    assert_eq!(body["usedCount"], 1);
    assert_eq!(body["remainingCount"], 2);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let app = TestApp::new(quota_config(3));
    let response = app.send(chat_request(Some("s"), "   ")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reset_restores_quota_and_clears_history() {
    let app = TestApp::new(quota_config(1));
    app.send(chat_request(Some("s"), "hi")).await;
    assert_eq!(
        app.send(chat_request(Some("s"), "hi")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let reset = browser_request(Method::POST, "/api/session/reset")
        .header("x-session-id", "s")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.send(reset).await).await;
    assert_eq!(body["success"], true);
    assert_eq!(app.backend.cleared.lock().unwrap().as_slice(), ["s"]);

    assert_eq!(
        app.send(chat_request(Some("s"), "hi")).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_remaining_endpoint() {
    let app = TestApp::new(quota_config(5));
    app.send(chat_request(Some("s"), "hi")).await;
    app.send(chat_request(Some("s"), "hi")).await;

    let with_session = browser_request(Method::GET, "/api/session/remaining")
        .header("x-session-id", "s")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.send(with_session).await).await;
    assert_eq!(body["remaining"], 3);
    assert_eq!(body["total"], 5);

    let without_session = browser_request(Method::GET, "/api/session/remaining")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.send(without_session).await).await;
    assert_eq!(body["remaining"], 5);
}

#[tokio::test]
async fn test_session_quota_expires_after_a_day() {
    let app = TestApp::new(quota_config(1));
    app.send(chat_request(Some("s"), "hi")).await;

    app.clock.advance(Duration::from_secs(24 * 3600 + 1));
    let response = app.send(chat_request(Some("s"), "hi again")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["usedCount"], 1);
}
