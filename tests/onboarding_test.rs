// ABOUTME: Integration tests for the identity endpoint and onboarding flow
// ABOUTME: Covers first-run account creation and the onboarding-required gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{AnswerScript, TestApp};
use helpers::axum_test::AxumTestRequest;

use axum::http::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_me_reports_onboarding_required_for_fresh_identity() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let bearer = format!(
        "Bearer {}",
        app.token_for("auth0|carol", "carol@example.com", "Carol")
    );

    let response = AxumTestRequest::get("/api/auth/me")
        .header("authorization", &bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["email"], "carol@example.com");
    assert_eq!(body["onboardingRequired"], true);
    assert!(body.get("user").is_none());
}

#[tokio::test]
async fn test_onboarding_creates_user_organization_and_group() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let bearer = format!(
        "Bearer {}",
        app.token_for("auth0|carol", "carol@example.com", "Carol")
    );

    let response = AxumTestRequest::post("/api/onboarding")
        .header("authorization", &bearer)
        .json(&json!({ "organizationName": "Carol Corp" }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["user"]["email"], "carol@example.com");
    assert_eq!(body["user"]["name"], "Carol");
    assert_eq!(body["organization"]["name"], "Carol Corp");
    // Group name defaults when not supplied
    assert_eq!(body["group"]["name"], "General");

    // The identity endpoint now resolves the local account
    let me = AxumTestRequest::get("/api/auth/me")
        .header("authorization", &bearer)
        .send(app.router.clone())
        .await;
    let me_body: Value = me.json();
    assert_eq!(me_body["onboardingRequired"], false);
    assert_eq!(me_body["user"]["email"], "carol@example.com");
}

#[tokio::test]
async fn test_onboarding_twice_is_rejected() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let bearer = format!(
        "Bearer {}",
        app.token_for("auth0|carol", "carol@example.com", "Carol")
    );

    let first = AxumTestRequest::post("/api/onboarding")
        .header("authorization", &bearer)
        .json(&json!({ "organizationName": "Carol Corp" }))
        .send(app.router.clone())
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = AxumTestRequest::post("/api/onboarding")
        .header("authorization", &bearer)
        .json(&json!({ "organizationName": "Another" }))
        .send(app.router.clone())
        .await;
    assert_eq!(second.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_onboarding_requires_organization_name() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let bearer = format!(
        "Bearer {}",
        app.token_for("auth0|carol", "carol@example.com", "Carol")
    );

    let response = AxumTestRequest::post("/api/onboarding")
        .header("authorization", &bearer)
        .json(&json!({}))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unverified_email_cannot_onboard() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let bearer = format!(
        "Bearer {}",
        app.unverified_token_for("auth0|mallory", "mallory@example.com")
    );

    let response = AxumTestRequest::post("/api/onboarding")
        .header("authorization", &bearer)
        .json(&json!({ "organizationName": "Mallory Inc" }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_local_account() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let bearer = format!(
        "Bearer {}",
        app.token_for("auth0|carol", "carol@example.com", "Carol")
    );

    // Valid token, no local account yet
    let response = AxumTestRequest::get("/api/conversations")
        .header("authorization", &bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "ONBOARDING_REQUIRED");
}
