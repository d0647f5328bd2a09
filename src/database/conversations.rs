// ABOUTME: Database operations for conversations and their append-only message log
// ABOUTME: Title setting and updated_at bumps are separate calls so turn policy stays upstream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::errors::{AppError, AppResult};
use crate::models::{Conversation, Message, MessageRole};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// A conversation denormalized with its group and organization, for detail views
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWithGroup {
    /// The conversation
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Group name
    pub group_name: String,
    /// Organization id
    pub organization_id: String,
    /// Organization name
    pub organization_name: String,
}

/// Last message preview in a conversation listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    /// Message content
    pub content: String,
    /// Author role
    pub role: MessageRole,
    /// Append timestamp (RFC 3339)
    pub created_at: String,
}

/// Listing view of one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Conversation id
    pub id: String,
    /// Derived title, absent until the first exchange completes
    pub title: Option<String>,
    /// Group id
    pub group_id: String,
    /// Group name
    pub group_name: String,
    /// Organization id
    pub organization_id: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last completed-turn timestamp (RFC 3339)
    pub updated_at: String,
    /// Most recent message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
}

/// Conversation and message database operations
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    /// Create a new conversation store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a conversation with no title.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_conversation(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> AppResult<Conversation> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO conversations (id, user_id, group_id, title, created_at, updated_at)
            VALUES ($1, $2, $3, NULL, $4, $4)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(group_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(Conversation {
            id,
            user_id: user_id.to_owned(),
            group_id: group_id.to_owned(),
            title: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Fetch one conversation without any ownership filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get(&self, conversation_id: &str) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, group_id, title, created_at, updated_at
            FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.map(row_to_conversation))
    }

    /// Fetch one conversation denormalized with group and organization names.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_with_group(
        &self,
        conversation_id: &str,
    ) -> AppResult<Option<ConversationWithGroup>> {
        let row = sqlx::query(
            r"
            SELECT c.id, c.user_id, c.group_id, c.title, c.created_at, c.updated_at,
                   g.name AS group_name, g.organization_id, o.name AS organization_name
            FROM conversations c
            JOIN groups g ON g.id = c.group_id
            JOIN organizations o ON o.id = g.organization_id
            WHERE c.id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.map(|r| {
            let group_name: String = r.get("group_name");
            let organization_id: String = r.get("organization_id");
            let organization_name: String = r.get("organization_name");
            ConversationWithGroup {
                conversation: row_to_conversation(r),
                group_name,
                organization_id,
                organization_name,
            }
        }))
    }

    /// List a user's conversations, most recently updated first, each with
    /// its most recent message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_user_conversations(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.title, c.group_id, c.created_at, c.updated_at,
                   g.name AS group_name, g.organization_id,
                   m.content AS last_content, m.role AS last_role, m.created_at AS last_at
            FROM conversations c
            JOIN groups g ON g.id = c.group_id
            LEFT JOIN messages m ON m.id = (
                SELECT id FROM messages
                WHERE conversation_id = c.id
                ORDER BY created_at DESC
                LIMIT 1
            )
            WHERE c.user_id = $1
            ORDER BY c.updated_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        rows.into_iter()
            .map(|r| {
                let last_message = match r.get::<Option<String>, _>("last_content") {
                    Some(content) => {
                        let role_raw: String = r.get("last_role");
                        Some(LastMessage {
                            content,
                            role: MessageRole::from_str(&role_raw).map_err(AppError::database)?,
                            created_at: r.get("last_at"),
                        })
                    }
                    None => None,
                };

                Ok(ConversationSummary {
                    id: r.get("id"),
                    title: r.get("title"),
                    group_id: r.get("group_id"),
                    group_name: r.get("group_name"),
                    organization_id: r.get("organization_id"),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                    last_message,
                })
            })
            .collect()
    }

    /// Append a message. Never reorders, never dedupes, never touches the
    /// conversation's `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<Message> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to append message: {e}")))?;

        Ok(Message {
            id,
            conversation_id: conversation_id.to_owned(),
            role,
            content: content.to_owned(),
            created_at: now,
        })
    }

    /// All messages of a conversation in chronological order, fresh read.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_messages(&self, conversation_id: &str) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages: {e}")))?;

        rows.into_iter()
            .map(|r| {
                let role_raw: String = r.get("role");
                Ok(Message {
                    id: r.get("id"),
                    conversation_id: r.get("conversation_id"),
                    role: MessageRole::from_str(&role_raw).map_err(AppError::database)?,
                    content: r.get("content"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }

    /// Set the title only when none is set yet. Returns whether a title was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn set_title_if_unset(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE conversations
            SET title = $1
            WHERE id = $2 AND title IS NULL
            ",
        )
        .bind(title)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to set conversation title: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Bump `updated_at` to now. Called only when a turn completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn touch_updated_at(&self, conversation_id: &str) -> AppResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            UPDATE conversations
            SET updated_at = $1
            WHERE id = $2
            ",
        )
        .bind(&now)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to touch conversation: {e}")))?;

        Ok(())
    }
}

fn row_to_conversation(r: sqlx::sqlite::SqliteRow) -> Conversation {
    Conversation {
        id: r.get("id"),
        user_id: r.get("user_id"),
        group_id: r.get("group_id"),
        title: r.get("title"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}
