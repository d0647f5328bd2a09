// ABOUTME: Integration tests for document upload, listing and deletion
// ABOUTME: Covers group assignment, size limits and sync-outcome status transitions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{seed_workspace, AnswerScript, ScriptedBackend, SyncScript, TestApp};
use helpers::axum_test::AxumTestRequest;
use nova_server::models::OrgRole;

use axum::http::StatusCode;
use base64::Engine;
use serde_json::{json, Value};

fn encode(content: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(content)
}

#[tokio::test]
async fn test_upload_stores_blob_and_records_document() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let response = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &ws.bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "notes.txt",
            "contentType": "text/plain",
            "contentBase64": encode(b"hello world"),
            "groupIds": [ws.group_id],
        }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["document"]["filename"], "notes.txt");
    assert_eq!(body["document"]["fileSize"], 11);
    // The scripted backend reports a sync job, so indexing resolves
    assert_eq!(body["document"]["embeddingStatus"], "completed");
    assert_eq!(body["syncJobId"], "sync-job-1");

    // The blob is retrievable under its storage key
    let storage_key = body["document"]["storageKey"].as_str().unwrap();
    assert!(storage_key.starts_with(&format!("{}/", ws.organization_id)));
    let stored = app.resources.storage.get(storage_key).await.unwrap();
    assert_eq!(stored, b"hello world");

    // And assigned to the requested group
    let document_id = body["document"]["id"].as_str().unwrap();
    let group_ids = app
        .resources
        .database
        .documents()
        .group_ids(document_id)
        .await
        .unwrap();
    assert_eq!(group_ids, vec![ws.group_id.clone()]);
}

#[tokio::test]
async fn test_org_wide_upload_reaches_every_group() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let second_group = app
        .resources
        .database
        .groups()
        .create_group(&ws.organization_id, "Research", None, None, &ws.user.id)
        .await
        .unwrap();

    let response = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &ws.bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "handbook.pdf",
            "contentType": "application/pdf",
            "contentBase64": encode(b"pdf bytes"),
            "orgWide": true,
        }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    let document_id = body["document"]["id"].as_str().unwrap();
    let mut group_ids = app
        .resources
        .database
        .documents()
        .group_ids(document_id)
        .await
        .unwrap();
    group_ids.sort();

    let mut expected = vec![ws.group_id.clone(), second_group.id];
    expected.sort();
    assert_eq!(group_ids, expected);
}

#[tokio::test]
async fn test_failed_sync_marks_document_failed_but_upload_succeeds() {
    let backend = ScriptedBackend::new(AnswerScript::Fragments(vec![]))
        .with_sync(SyncScript::Fail("indexer unreachable".to_owned()));
    let app = TestApp::with_backend(backend).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let response = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &ws.bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "notes.txt",
            "contentType": "text/plain",
            "contentBase64": encode(b"content"),
            "groupIds": [ws.group_id],
        }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["document"]["embeddingStatus"], "failed");
    assert!(body.get("syncJobId").is_none());
}

#[tokio::test]
async fn test_invalid_base64_is_rejected() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let response = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &ws.bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "notes.txt",
            "contentType": "text/plain",
            "contentBase64": "not base64!!!",
            "groupIds": [ws.group_id],
        }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversize_upload_is_rejected() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let oversized = vec![0u8; 10 * 1024 * 1024 + 1];
    let response = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &ws.bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "big.bin",
            "contentType": "application/octet-stream",
            "contentBase64": encode(&oversized),
            "groupIds": [ws.group_id],
        }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_requires_org_membership() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    app.create_user("auth0|bob", "bob@example.com", "Bob")
        .await
        .unwrap();
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    let response = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &bob_bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "notes.txt",
            "contentType": "text/plain",
            "contentBase64": encode(b"content"),
            "groupIds": [ws.group_id],
        }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_foreign_group_assignment_is_rejected() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();
    let other = seed_workspace(&app, "auth0|eve", "eve@example.com")
        .await
        .unwrap();

    // A group of a different organization cannot be targeted
    let response = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &ws.bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "notes.txt",
            "contentType": "text/plain",
            "contentBase64": encode(b"content"),
            "groupIds": [other.group_id],
        }))
        .send(app.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_is_limited_to_uploader_or_admin() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();

    let upload = AxumTestRequest::post("/api/documents/upload")
        .header("authorization", &ws.bearer)
        .json(&json!({
            "organizationId": ws.organization_id,
            "filename": "notes.txt",
            "contentType": "text/plain",
            "contentBase64": encode(b"content"),
            "groupIds": [ws.group_id],
        }))
        .send(app.router.clone())
        .await;
    let body: Value = upload.json();
    let document_id = body["document"]["id"].as_str().unwrap().to_owned();

    // A plain member who did not upload it cannot delete
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
    let bob_bearer = format!("Bearer {}", app.token_for("auth0|bob", "bob@example.com", "Bob"));

    let forbidden = AxumTestRequest::delete(&format!("/api/documents/{document_id}"))
        .header("authorization", &bob_bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    // The uploader can
    let deleted = AxumTestRequest::delete(&format!("/api/documents/{document_id}"))
        .header("authorization", &ws.bearer)
        .send(app.router.clone())
        .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);

    let listing = AxumTestRequest::get(&format!(
        "/api/documents?organizationId={}",
        ws.organization_id
    ))
    .header("authorization", &ws.bearer)
    .send(app.router.clone())
    .await;
    let body: Value = listing.json();
    assert_eq!(body["documents"].as_array().unwrap().len(), 0);
}
