// ABOUTME: End-to-end tests for the Rust chat stream client
// ABOUTME: Runs the API on an ephemeral port and consumes it over real HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{seed_workspace, AnswerScript, ScriptedBackend, TestApp, TestWorkspace};
use nova_server::client::{ChatEvent, ChatStreamClient};

async fn serve(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn session_token(ws: &TestWorkspace) -> String {
    ws.bearer.trim_start_matches("Bearer ").to_owned()
}

#[tokio::test]
async fn test_client_collects_streamed_answer() {
    let app = TestApp::new(AnswerScript::Fragments(vec![
        "stream".to_owned(),
        "ed".to_owned(),
    ]))
    .await
    .unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();
    let base_url = serve(&app).await;

    let client = ChatStreamClient::new(&base_url, &session_token(&ws)).unwrap();
    let handle = client
        .send_message("Hello", &ws.group_id, None)
        .await
        .unwrap();
    let turn = handle.collect().await.unwrap();

    assert!(!turn.conversation_id.is_empty());
    assert_eq!(turn.answer, "streamed");
}

#[tokio::test]
async fn test_client_yields_events_in_order() {
    let app = TestApp::new(AnswerScript::Fragments(vec!["one".to_owned()]))
        .await
        .unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();
    let base_url = serve(&app).await;

    let client = ChatStreamClient::new(&base_url, &session_token(&ws)).unwrap();
    let mut handle = client
        .send_message("Hello", &ws.group_id, None)
        .await
        .unwrap();

    let first = handle.next_event().await.unwrap().unwrap();
    assert!(matches!(first, ChatEvent::ConversationId(_)));

    let second = handle.next_event().await.unwrap().unwrap();
    assert_eq!(second, ChatEvent::Content("one".to_owned()));

    let third = handle.next_event().await.unwrap().unwrap();
    assert_eq!(third, ChatEvent::Done);
}

#[tokio::test]
async fn test_client_surfaces_in_band_errors() {
    let app = TestApp::new(AnswerScript::FailBeforeStream("backend down".to_owned()))
        .await
        .unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();
    let base_url = serve(&app).await;

    let client = ChatStreamClient::new(&base_url, &session_token(&ws)).unwrap();
    let handle = client
        .send_message("Hello", &ws.group_id, None)
        .await
        .unwrap();

    let result = handle.collect().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_second_turn_while_streaming_is_refused() {
    let app = TestApp::with_backend(ScriptedBackend::new(AnswerScript::Gated(vec![
        "held".to_owned(),
    ])))
    .await
    .unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();
    let base_url = serve(&app).await;

    let client = ChatStreamClient::new(&base_url, &session_token(&ws)).unwrap();
    let handle = client
        .send_message("Hello", &ws.group_id, None)
        .await
        .unwrap();

    // One outstanding turn per client, refused locally
    let second = client.send_message("Again", &ws.group_id, None).await;
    assert!(second.is_err());

    app.backend.release_gate();
    let turn = handle.collect().await.unwrap();
    assert_eq!(turn.answer, "held");

    // Draining the turn frees the slot
    app.backend.release_gate();
    let third = client
        .send_message("Hello again", &ws.group_id, None)
        .await
        .unwrap();
    assert_eq!(third.collect().await.unwrap().answer, "held");
}

#[tokio::test]
async fn test_client_reports_refused_requests() {
    let app = TestApp::new(AnswerScript::Fragments(vec![])).await.unwrap();
    let ws = seed_workspace(&app, "auth0|alice", "alice@example.com")
        .await
        .unwrap();
    let base_url = serve(&app).await;

    // Bad token, refused before the stream starts
    let client = ChatStreamClient::new(&base_url, "not-a-token").unwrap();
    let result = client.send_message("Hello", &ws.group_id, None).await;
    assert!(result.is_err());
}
