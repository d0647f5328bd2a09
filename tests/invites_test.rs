// ABOUTME: Integration tests for group invites and acceptance
// ABOUTME: Covers issuance permissions, the join flow and token rejection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{seed_workspace, AnswerScript, TestApp};
use helpers::axum_test::AxumTestRequest;
use nova_server::models::OrgRole;

use axum::http::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_invite_round_trip() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let issued = AxumTestRequest::post(&format!("/api/groups/{}/invite", ws.group_id))
        .header("authorization", &ws.bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(issued.status_code(), StatusCode::OK);

    let body: Value = issued.json();
    let token = body["token"].as_str().unwrap().to_owned();
    let url = body["inviteUrl"].as_str().unwrap();
    assert!(url.contains("/invite?token="));

    // The token alone carries everything the acceptance page shows
    let claims = app.resources.invites.verify(&token).unwrap();
    assert_eq!(claims.group_name, "General");
    assert_eq!(claims.organization_name, "Acme");
    assert_eq!(claims.invited_by, ws.user.id);
    assert_eq!(claims.invited_by_name, "Test User");
    assert!(claims.iat <= claims.exp);

    // Bob accepts and gains both memberships
    let bob = app
        .create_user("auth0|bob", "bob@example.com", "Bob")
        .await
        .unwrap();
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    let accepted = AxumTestRequest::post("/api/invite/accept")
        .header("authorization", &bob_bearer)
        .json(&json!({ "token": token }))
        .send(app.router.clone())
        .await;
    assert_eq!(accepted.status_code(), StatusCode::OK);

    let body: Value = accepted.json();
    assert_eq!(body["groupId"], ws.group_id.as_str());
    assert_eq!(body["groupName"], "General");

    let access = app.resources.database.access();
    assert!(access.is_group_member(&bob.id, &ws.group_id).await.unwrap());
    assert_eq!(
        access
            .role_in_organization(&bob.id, &ws.organization_id)
            .await
            .unwrap(),
        Some(OrgRole::Member)
    );
}

#[tokio::test]
async fn test_accepting_twice_is_rejected() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let issued = AxumTestRequest::post(&format!("/api/groups/{}/invite", ws.group_id))
        .header("authorization", &ws.bearer)
        .send(app.router.clone())
        .await;
    let body: Value = issued.json();
    let token = body["token"].as_str().unwrap().to_owned();

    app.create_user("auth0|bob", "bob@example.com", "Bob")
        .await
        .unwrap();
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    let first = AxumTestRequest::post("/api/invite/accept")
        .header("authorization", &bob_bearer)
        .json(&json!({ "token": token }))
        .send(app.router.clone())
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = AxumTestRequest::post("/api/invite/accept")
        .header("authorization", &bob_bearer)
        .json(&json!({ "token": token }))
        .send(app.router.clone())
        .await;
    assert_eq!(second.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_admins_can_issue_invites() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let bob = app
        .create_user("auth0|bob", "bob@example.com", "Bob")
        .await
        .unwrap();
    app.resources
        .database
        .orgs()
        .add_member(&ws.organization_id, &bob.id, OrgRole::Member)
        .await
        .unwrap();
    app.resources
        .database
        .groups()
        .add_member(&ws.group_id, &bob.id)
        .await
        .unwrap();
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    let response = AxumTestRequest::post(&format!("/api/groups/{}/invite", ws.group_id))
        .header("authorization", &bob_bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let issued = AxumTestRequest::post(&format!("/api/groups/{}/invite", ws.group_id))
        .header("authorization", &ws.bearer)
        .send(app.router.clone())
        .await;
    let body: Value = issued.json();
    let mut token = body["token"].as_str().unwrap().to_owned();
    token.push('x');

    app.create_user("auth0|bob", "bob@example.com", "Bob")
        .await
        .unwrap();
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    let response = AxumTestRequest::post("/api/invite/accept")
        .header("authorization", &bob_bearer)
        .json(&json!({ "token": token }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invite_to_deleted_group_is_not_found() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let issued = AxumTestRequest::post(&format!("/api/groups/{}/invite", ws.group_id))
        .header("authorization", &ws.bearer)
        .send(app.router.clone())
        .await;
    let body: Value = issued.json();
    let token = body["token"].as_str().unwrap().to_owned();

    app.resources
        .database
        .groups()
        .delete(&ws.group_id)
        .await
        .unwrap();

    app.create_user("auth0|bob", "bob@example.com", "Bob")
        .await
        .unwrap();
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    let response = AxumTestRequest::post("/api/invite/accept")
        .header("authorization", &bob_bearer)
        .json(&json!({ "token": token }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_visibility_follows_membership() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    app.create_user("auth0|bob", "bob@example.com", "Bob")
        .await
        .unwrap();
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    // No membership, no visibility
    let before = AxumTestRequest::get(&format!("/api/groups/{}", ws.group_id))
        .header("authorization", &bob_bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(before.status_code(), StatusCode::FORBIDDEN);

    let issued = AxumTestRequest::post(&format!("/api/groups/{}/invite", ws.group_id))
        .header("authorization", &ws.bearer)
        .send(app.router.clone())
        .await;
    let body: Value = issued.json();
    let token = body["token"].as_str().unwrap().to_owned();

    AxumTestRequest::post("/api/invite/accept")
        .header("authorization", &bob_bearer)
        .json(&json!({ "token": token }))
        .send(app.router.clone())
        .await;

    let after = AxumTestRequest::get(&format!("/api/groups/{}", ws.group_id))
        .header("authorization", &bob_bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(after.status_code(), StatusCode::OK);
}
