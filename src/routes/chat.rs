// ABOUTME: The chat-turn endpoint streaming answer fragments over SSE
// ABOUTME: Validates, access-checks and resolves the conversation before the stream commits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Chat routes
//!
//! `POST /api/chat` runs one turn. Validation, authentication and access
//! checks all happen before the streaming response starts, so they can
//! still surface as proper HTTP statuses; everything after the 200 is
//! committed arrives as SSE events. `GET /api/chat/:conversation_id`
//! returns the conversation detail with its ordered messages.

use crate::{
    constants::chat::STREAM_DONE_MARKER,
    database::conversations::ConversationWithGroup,
    errors::AppError,
    models::Message,
    resources::ServerResources,
    services::chat_turn::{spawn_turn, TurnEvent, TurnRequest},
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for one chat turn
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    /// The user message
    #[serde(default)]
    pub message: Option<String>,
    /// Existing conversation to continue, a new one is created when absent
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Group the question is asked in
    #[serde(default)]
    pub group_id: Option<String>,
}

/// Response for the conversation detail endpoint
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetailResponse {
    /// Conversation with group and organization denormalized
    pub conversation: ConversationWithGroup,
    /// All messages, oldest first
    pub messages: Vec<Message>,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat route handlers
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat", post(Self::send_message))
            .route("/api/chat/:conversation_id", get(Self::get_conversation))
            .with_state(resources)
    }

    /// Run one chat turn as an SSE stream.
    ///
    /// Frame order: `{"conversationId"}` once, `{"content"}` per fragment,
    /// then `[DONE]` on success. A failed turn ends with a single
    /// `{"error"}` frame instead of the terminator.
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<ChatTurnRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AppError::missing_field("message"))?
            .to_owned();
        let group_id = request
            .group_id
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| AppError::missing_field("groupId"))?
            .to_owned();

        // Access before any side effect: strict membership on the group,
        // ownership on an existing conversation.
        if !resources
            .database
            .access()
            .is_group_member(&user.id, &group_id)
            .await?
        {
            return Err(AppError::permission_denied(
                "You do not have access to this group",
            ));
        }

        let store = resources.database.conversations();

        let conversation_id = match request.conversation_id.as_deref().filter(|c| !c.is_empty()) {
            // Absent ids get the same refusal as unowned ones, so the
            // endpoint never confirms whether a conversation exists
            Some(existing) => match store.get(existing).await? {
                Some(conversation) if conversation.user_id == user.id => conversation.id,
                _ => {
                    return Err(AppError::permission_denied(
                        "You do not have access to this conversation",
                    ));
                }
            },
            None => store.create_conversation(&user.id, &group_id).await?.id,
        };

        let rag_instance = resources
            .database
            .groups()
            .get(&group_id)
            .await?
            .and_then(|g| g.rag_instance_id);

        info!(
            user.id = %user.id,
            conversation.id = %conversation_id,
            group.id = %group_id,
            "Chat turn started"
        );

        let mut events = spawn_turn(
            store,
            resources.backend.clone(),
            TurnRequest {
                conversation_id,
                message,
                rag_instance,
            },
        );

        let stream = async_stream::stream! {
            while let Some(event) = events.recv().await {
                match event {
                    TurnEvent::ConversationId(id) => {
                        let payload = serde_json::json!({ "conversationId": id });
                        yield Ok(Event::default().data(payload.to_string()));
                    }
                    TurnEvent::Content(fragment) => {
                        let payload = serde_json::json!({ "content": fragment });
                        yield Ok(Event::default().data(payload.to_string()));
                    }
                    TurnEvent::Error(message) => {
                        // The error frame is the last frame; no terminator follows
                        let payload = serde_json::json!({ "error": message });
                        yield Ok(Event::default().data(payload.to_string()));
                        return;
                    }
                    TurnEvent::Done => {
                        yield Ok(Event::default().data(STREAM_DONE_MARKER));
                        return;
                    }
                }
            }
        };

        Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
    }

    /// Conversation detail: ownership check first, then the message log.
    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Json<ConversationDetailResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let store = resources.database.conversations();
        let detail = store
            .get_with_group(&conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        if detail.conversation.user_id != user.id {
            return Err(AppError::permission_denied(
                "You do not have access to this conversation",
            ));
        }

        let messages = store.list_messages(&conversation_id).await?;

        Ok(Json(ConversationDetailResponse {
            conversation: detail,
            messages,
        }))
    }
}
