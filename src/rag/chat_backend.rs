// ABOUTME: OpenAI-compatible streaming chat-completion answer backend
// ABOUTME: Sends system prompt, bounded history and the new message with stream enabled
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Chat-completion backend
//!
//! Talks to any endpoint implementing the `OpenAI` `/chat/completions`
//! protocol with `stream: true`, including local inference servers. Each
//! streamed delta becomes one answer fragment.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::sse::create_sse_stream;
use super::{AnswerContext, AnswerProvider, AnswerStream, TurnMessage};
use crate::config::BackendConfig;
use crate::constants::{rag, service_names};
use crate::errors::{AppError, AppResult};
use crate::rag::prompts::NOVA_SYSTEM_PROMPT;

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<CompletionMessage>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct CompletionMessage {
    role: String,
    content: String,
}

impl From<&TurnMessage> for CompletionMessage {
    fn from(msg: &TurnMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// One streamed chunk of a completion response
#[derive(Debug, Deserialize)]
struct CompletionStreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Backend
// ============================================================================

/// Streaming chat-completion answer backend
pub struct ChatCompletionBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionBackend {
    /// Build the backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &BackendConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(rag::CONNECT_TIMEOUT)
            .timeout(rag::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn build_messages(ctx: &AnswerContext) -> Vec<CompletionMessage> {
        let mut messages = Vec::with_capacity(ctx.history.len() + 2);
        messages.push(CompletionMessage {
            role: "system".to_owned(),
            content: NOVA_SYSTEM_PROMPT.to_owned(),
        });
        messages.extend(ctx.history.iter().map(CompletionMessage::from));
        messages.push(CompletionMessage {
            role: "user".to_owned(),
            content: ctx.message.clone(),
        });
        messages
    }
}

#[async_trait]
impl AnswerProvider for ChatCompletionBackend {
    #[instrument(skip(self, ctx), fields(history_len = ctx.history.len()))]
    async fn stream_answer(&self, ctx: AnswerContext) -> AppResult<AnswerStream> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: Self::build_messages(&ctx),
            stream: true,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Starting streaming completion");

        let mut builder = self.client.post(&url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::external_service(
                service_names::ANSWER_BACKEND,
                format!("Request failed: {e}"),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                service_names::ANSWER_BACKEND,
                format!("HTTP {status}: {body}"),
            ));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            |payload| match serde_json::from_str::<CompletionStreamChunk>(payload) {
                Ok(chunk) => chunk
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.clone())
                    .map(Ok),
                Err(e) => Some(Err(AppError::external_service(
                    service_names::ANSWER_BACKEND,
                    format!("Malformed stream chunk: {e}"),
                ))),
            },
            service_names::ANSWER_BACKEND,
        ))
    }
}
