// ABOUTME: Answer-provider abstraction over retrieval and chat-completion backends
// ABOUTME: Defines the fragment stream contract every backend must uphold
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Answer providers
//!
//! A provider turns a conversation context into a stream of answer
//! fragments. Fragment boundaries carry no meaning: concatenating the
//! fragments in emission order yields the full answer. Failures surface as
//! one typed error, either before the stream is returned or as an item
//! mid-stream; fragments already emitted remain valid.

pub mod autorag;
pub mod chat_backend;
pub mod prompts;
pub mod sse;

pub use autorag::AutoRagClient;
pub use chat_backend::ChatCompletionBackend;

use crate::config::{BackendConfig, BackendMode};
use crate::errors::AppResult;
use crate::models::MessageRole;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// One prior turn handed to a provider as context
#[derive(Debug, Clone)]
pub struct TurnMessage {
    /// Author role
    pub role: MessageRole,
    /// Full text content
    pub content: String,
}

impl TurnMessage {
    /// Context entry authored by the user
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Context entry authored by the assistant
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a provider needs to answer one turn
#[derive(Debug, Clone)]
pub struct AnswerContext {
    /// Prior turns, oldest first, already bounded by the caller
    pub history: Vec<TurnMessage>,
    /// The new user message
    pub message: String,
    /// Retrieval instance override for the asking group
    pub rag_instance: Option<String>,
}

/// Stream of answer fragments
pub type AnswerStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// A backend capable of answering one chat turn as a fragment stream
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Start answering; fragments arrive in emission order.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend request cannot be started. Errors
    /// after the first fragment arrive as stream items.
    async fn stream_answer(&self, ctx: AnswerContext) -> AppResult<AnswerStream>;

    /// Trigger one indexing sync, returning the job id when the backend
    /// has an indexing pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync request fails.
    async fn trigger_sync(&self, rag_instance: Option<&str>) -> AppResult<Option<String>> {
        let _ = rag_instance;
        Ok(None)
    }
}

/// The configured answer backend
pub enum AnswerBackend {
    /// OpenAI-compatible streaming chat completions
    Chat(ChatCompletionBackend),
    /// Managed retrieval endpoint with simulated streaming
    AutoRag(AutoRagClient),
}

impl AnswerBackend {
    /// Build the backend selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &BackendConfig) -> AppResult<Self> {
        match config.mode {
            BackendMode::ChatCompletion => {
                Ok(Self::Chat(ChatCompletionBackend::new(config)?))
            }
            BackendMode::AutoRag => Ok(Self::AutoRag(AutoRagClient::new(config)?)),
        }
    }
}

#[async_trait]
impl AnswerProvider for AnswerBackend {
    async fn stream_answer(&self, ctx: AnswerContext) -> AppResult<AnswerStream> {
        match self {
            Self::Chat(backend) => backend.stream_answer(ctx).await,
            Self::AutoRag(client) => client.stream_answer(ctx).await,
        }
    }

    /// Only the retrieval backend has an indexing pipeline; the
    /// chat-completion backend reports no job.
    async fn trigger_sync(&self, rag_instance: Option<&str>) -> AppResult<Option<String>> {
        match self {
            Self::Chat(_) => Ok(None),
            Self::AutoRag(client) => client.sync_documents(rag_instance).await.map(Some),
        }
    }
}

impl std::fmt::Debug for AnswerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat(_) => f.write_str("AnswerBackend::Chat"),
            Self::AutoRag(_) => f.write_str("AnswerBackend::AutoRag"),
        }
    }
}
