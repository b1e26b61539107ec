// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use chat_admission::AdmissionConfig;

use super::common::{browser_request, chat_request, json_body, text_body, TestApp};

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(AdmissionConfig::default());
    let request = browser_request(Method::GET, "/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "OK");
}

#[tokio::test]
async fn test_config_exposes_limits() {
    let config = AdmissionConfig {
        max_conversations_per_session: 7,
        ..AdmissionConfig::default()
    };
    let app = TestApp::new(config);
    let request = browser_request(Method::GET, "/api/config")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.send(request).await).await;

    assert_eq!(body["maxConversationsPerSession"], 7);
    assert_eq!(body["maxRequestsPerMinute"], 20);
    assert_eq!(body["maxRequestsPerHour"], 100);
    assert_eq!(body["banThreshold"], 50);
    assert_eq!(body["banDurationMinutes"], 60);
}

#[tokio::test]
async fn test_version() {
    let app = TestApp::new(AdmissionConfig::default());
    let request = browser_request(Method::GET, "/api/version")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.send(request).await).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_reflect_traffic() {
    let app = TestApp::new(AdmissionConfig::default());
    app.send(chat_request(Some("s"), "hi")).await;

    let request = browser_request(Method::GET, "/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = text_body(response).await;

    assert!(text.contains("chat_turns_total 1"));
    assert!(text.contains("admission_sessions 1"));
    assert!(text.contains("admission_rate_buckets 1"));
    // The chat request and the scrape itself were both admitted
    assert!(text.contains("admission_decisions_total{outcome=\"allowed\"} 2"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new(AdmissionConfig::default());
    let request = browser_request(Method::GET, "/api/nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::NOT_FOUND);
}
