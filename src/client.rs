// ABOUTME: Rust client for the chat-turn endpoint with cancellation support
// ABOUTME: Decodes the SSE frames into typed events and accumulates answers in order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Chat stream client
//!
//! Consumes `POST /api/chat` from Rust. One call issues the request, reads
//! the body as a byte stream through the shared SSE line buffer, and
//! decodes each `data:` payload into a [`ChatEvent`]. The returned
//! [`TurnHandle`] yields events in arrival order; dropping it (or calling
//! [`TurnHandle::abort`]) tears down the transport, which is exactly the
//! disconnect signal the server reacts to. One client allows at most one
//! outstanding turn.

use crate::constants::chat::STREAM_DONE_MARKER;
use crate::errors::{AppError, AppResult};
use crate::rag::sse::{SseEvent, SseLineBuffer};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One decoded event of a streamed chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Conversation id, always first
    ConversationId(String),
    /// One answer fragment
    Content(String),
    /// In-band failure; the turn is over
    Error(String),
    /// Successful completion
    Done,
}

/// Wire shape of one `data:` payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatFrame {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one SSE event into a chat event.
fn decode_event(event: &SseEvent) -> Option<AppResult<ChatEvent>> {
    match event {
        SseEvent::Done => Some(Ok(ChatEvent::Done)),
        SseEvent::Data(payload) => {
            if payload.trim() == STREAM_DONE_MARKER {
                return Some(Ok(ChatEvent::Done));
            }
            match serde_json::from_str::<ChatFrame>(payload) {
                Ok(frame) => {
                    if let Some(id) = frame.conversation_id {
                        Some(Ok(ChatEvent::ConversationId(id)))
                    } else if let Some(content) = frame.content {
                        Some(Ok(ChatEvent::Content(content)))
                    } else {
                        frame.error.map(|e| Ok(ChatEvent::Error(e)))
                    }
                }
                Err(e) => Some(Err(AppError::invalid_input(format!(
                    "Malformed stream frame: {e}"
                )))),
            }
        }
    }
}

/// Handle to one in-flight turn
pub struct TurnHandle {
    events: mpsc::Receiver<AppResult<ChatEvent>>,
    task: tokio::task::JoinHandle<()>,
    active: Arc<AtomicBool>,
}

impl TurnHandle {
    /// Next event, `None` once the stream is exhausted.
    pub async fn next_event(&mut self) -> Option<AppResult<ChatEvent>> {
        self.events.recv().await
    }

    /// Abort the turn by dropping the transport. The server observes the
    /// disconnect and skips finalization.
    pub fn abort(self) {
        self.task.abort();
        // Drop runs next and clears the active flag
    }

    /// Drain the turn to completion, returning the conversation id and the
    /// accumulated answer. An in-band error discards the partial content.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, in-band error events, or a
    /// stream that ends without a terminator.
    pub async fn collect(mut self) -> AppResult<CollectedTurn> {
        let mut conversation_id = None;
        let mut answer = String::new();

        while let Some(event) = self.next_event().await {
            match event? {
                ChatEvent::ConversationId(id) => conversation_id = Some(id),
                ChatEvent::Content(fragment) => answer.push_str(&fragment),
                ChatEvent::Error(message) => {
                    return Err(AppError::external_service("chat-turn", message));
                }
                ChatEvent::Done => {
                    return Ok(CollectedTurn {
                        conversation_id: conversation_id
                            .ok_or_else(|| AppError::internal("Stream sent no conversation id"))?,
                        answer,
                    });
                }
            }
        }

        Err(AppError::internal("Stream ended without terminator"))
    }
}

impl Drop for TurnHandle {
    fn drop(&mut self) {
        self.task.abort();
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Result of a fully drained turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedTurn {
    /// Conversation id announced by the stream
    pub conversation_id: String,
    /// Concatenated answer fragments
    pub answer: String,
}

/// Client for the chat-turn endpoint
pub struct ChatStreamClient {
    http: Client,
    base_url: String,
    session_token: String,
    active: Arc<AtomicBool>,
}

impl ChatStreamClient {
    /// Create a client for a server at `base_url` with a session token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, session_token: &str) -> AppResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            session_token: session_token.to_owned(),
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start one turn. A second call while a turn is streaming is refused.
    ///
    /// # Errors
    ///
    /// Returns an error when a turn is already outstanding, the request
    /// fails, or the server refuses it before streaming.
    pub async fn send_message(
        &self,
        message: &str,
        group_id: &str,
        conversation_id: Option<&str>,
    ) -> AppResult<TurnHandle> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(AppError::invalid_input(
                "A turn is already streaming on this client",
            ));
        }

        let body = serde_json::json!({
            "message": message,
            "groupId": group_id,
            "conversationId": conversation_id,
        });

        let response = match self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .bearer_auth(&self.session_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                return Err(AppError::external_service(
                    "chat-turn",
                    format!("Request failed: {e}"),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.active.store(false, Ordering::SeqCst);
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "chat-turn",
                format!("HTTP {status}: {body}"),
            ));
        }

        let (tx, rx) = mpsc::channel(16);
        let active = self.active.clone();

        let task = tokio::spawn(async move {
            let mut parser = SseLineBuffer::new();
            let mut bytes = response.bytes_stream();

            'read: while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for event in parser.feed(&chunk) {
                            if let Some(decoded) = decode_event(&event) {
                                let terminal = matches!(
                                    decoded,
                                    Ok(ChatEvent::Done | ChatEvent::Error(_)) | Err(_)
                                );
                                if tx.send(decoded).await.is_err() || terminal {
                                    break 'read;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(AppError::external_service(
                                "chat-turn",
                                format!("Stream read error: {e}"),
                            )))
                            .await;
                        break;
                    }
                }
            }

            for event in parser.flush() {
                if let Some(decoded) = decode_event(&event) {
                    let _ = tx.send(decoded).await;
                }
            }

            active.store(false, Ordering::SeqCst);
        });

        Ok(TurnHandle {
            events: rx,
            task,
            active: self.active.clone(),
        })
    }
}

impl std::fmt::Debug for ChatStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_conversation_id_frame() {
        let event = SseEvent::Data(r#"{"conversationId":"c-1"}"#.to_owned());
        assert_eq!(
            decode_event(&event).unwrap().unwrap(),
            ChatEvent::ConversationId("c-1".to_owned())
        );
    }

    #[test]
    fn test_decode_content_and_error_frames() {
        let content = SseEvent::Data(r#"{"content":"hello "}"#.to_owned());
        assert_eq!(
            decode_event(&content).unwrap().unwrap(),
            ChatEvent::Content("hello ".to_owned())
        );

        let error = SseEvent::Data(r#"{"error":"backend down"}"#.to_owned());
        assert_eq!(
            decode_event(&error).unwrap().unwrap(),
            ChatEvent::Error("backend down".to_owned())
        );
    }

    #[test]
    fn test_decode_done_variants() {
        assert_eq!(decode_event(&SseEvent::Done).unwrap().unwrap(), ChatEvent::Done);
        let inline = SseEvent::Data("[DONE]".to_owned());
        assert_eq!(decode_event(&inline).unwrap().unwrap(), ChatEvent::Done);
    }

    #[test]
    fn test_decode_malformed_frame() {
        let event = SseEvent::Data("not json".to_owned());
        assert!(decode_event(&event).unwrap().is_err());
    }

    #[test]
    fn test_decode_unknown_frame_skipped() {
        let event = SseEvent::Data(r#"{"other":1}"#.to_owned());
        assert!(decode_event(&event).is_none());
    }
}
