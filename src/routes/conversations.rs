// ABOUTME: Conversation listing for the signed-in user
// ABOUTME: Most recently updated first, each with a last-message preview
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::database::conversations::ConversationSummary;
use crate::errors::AppError;
use crate::resources::ServerResources;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response for the conversation listing
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListResponse {
    /// The caller's conversations
    pub conversations: Vec<ConversationSummary>,
}

/// Conversation listing routes
pub struct ConversationRoutes;

impl ConversationRoutes {
    /// Create all conversation routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/conversations", get(Self::list_conversations))
            .with_state(resources)
    }

    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<ConversationListResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let conversations = resources
            .database
            .conversations()
            .list_user_conversations(&user.id)
            .await?;

        Ok(Json(ConversationListResponse { conversations }))
    }
}
