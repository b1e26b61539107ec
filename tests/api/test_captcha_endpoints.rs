// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{header, Method, StatusCode},
};
use chat_admission::AdmissionConfig;
use serde_json::json;
use std::time::Duration;

use super::common::{browser_request, json_body, TestApp};

async fn fetch_challenge(app: &TestApp) -> (String, i64) {
    let request = browser_request(Method::GET, "/api/captcha/challenge")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let token = body["token"].as_str().unwrap().to_string();
    let answer = body["question"]
        .as_str()
        .unwrap()
        .trim_end_matches("= ?")
        .split('+')
        .map(|term| term.trim().parse::<i64>().unwrap())
        .sum();
    (token, answer)
}

async fn verify(app: &TestApp, payload: serde_json::Value) -> serde_json::Value {
    let request = browser_request(Method::POST, "/api/captcha/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn test_correct_answer_verifies_once() {
    let app = TestApp::new(AdmissionConfig::default());
    let (token, answer) = fetch_challenge(&app).await;
    assert_eq!(token.len(), 32);

    let body = verify(&app, json!({ "token": token, "answer": answer })).await;
    assert_eq!(body, json!({ "valid": true }));

    let body = verify(&app, json!({ "token": token, "answer": answer })).await;
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_wrong_answer_is_invalid() {
    let app = TestApp::new(AdmissionConfig::default());
    let (token, answer) = fetch_challenge(&app).await;

    let body = verify(&app, json!({ "token": token, "answer": answer + 1 })).await;
    assert_eq!(body["valid"], false);
    assert_eq!(app.state.challenges.pending(), 0);
}

#[tokio::test]
async fn test_incomplete_payload_reports_message() {
    let app = TestApp::new(AdmissionConfig::default());
    let (token, _) = fetch_challenge(&app).await;

    for payload in [
        json!({}),
        json!({ "token": token }),
        json!({ "answer": 7 }),
        json!({ "token": token, "answer": "seven" }),
    ] {
        let body = verify(&app, payload).await;
        assert_eq!(body["valid"], false);
        assert!(body["message"].is_string());
    }
    // Incomplete requests never touch the stored challenge
    assert_eq!(app.state.challenges.pending(), 1);
}

#[tokio::test]
async fn test_expired_challenge_is_invalid() {
    let app = TestApp::new(AdmissionConfig::default());
    let (token, answer) = fetch_challenge(&app).await;

    app.clock.advance(Duration::from_secs(5 * 60 + 1));
    let body = verify(&app, json!({ "token": token, "answer": answer })).await;
    assert_eq!(body["valid"], false);
}
