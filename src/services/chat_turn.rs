// ABOUTME: Streaming orchestrator driving one chat turn as a producer task
// ABOUTME: Emits turn events over a bounded channel; a failed send means the client left
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Chat-turn orchestrator
//!
//! One turn runs as a spawned producer task that owns the store handle and
//! the answer provider, sending [`TurnEvent`]s over a bounded channel to
//! the HTTP response. The channel is the cancellation signal: when the
//! client disconnects, the receiver drops, the next `send` fails, and the
//! producer stops without finalizing.
//!
//! Event order per turn: the conversation id first, unconditionally, then
//! one content event per provider fragment, then either done (after
//! persisting the assistant message, bumping `updated_at` and deriving the
//! title on a first exchange) or a single in-band error.

use crate::constants::chat::{CONTEXT_WINDOW_MESSAGES, TITLE_ELLIPSIS, TITLE_MAX_CHARS, TURN_CHANNEL_CAPACITY};
use crate::database::ConversationStore;
use crate::models::{Message, MessageRole};
use crate::rag::{AnswerContext, AnswerProvider, TurnMessage};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One event of a streamed chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The conversation id, always the first event
    ConversationId(String),
    /// One answer fragment, in emission order
    Content(String),
    /// Terminal in-band failure; no further events follow
    Error(String),
    /// Successful completion; no further events follow
    Done,
}

/// Input to one chat turn, validated and access-checked by the caller
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Resolved conversation id (created beforehand when none was supplied)
    pub conversation_id: String,
    /// The new user message, already known non-empty
    pub message: String,
    /// Retrieval instance of the asking group
    pub rag_instance: Option<String>,
}

/// Derive a conversation title from the first user message.
#[must_use]
pub fn derive_title(message: &str) -> String {
    if message.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = message.chars().take(TITLE_MAX_CHARS).collect();
        format!("{truncated}{TITLE_ELLIPSIS}")
    } else {
        message.to_owned()
    }
}

/// Spawn the producer task for one turn and return the event receiver.
///
/// The caller consumes the receiver; dropping it aborts the turn silently.
#[must_use]
pub fn spawn_turn(
    store: ConversationStore,
    provider: Arc<dyn AnswerProvider>,
    request: TurnRequest,
) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel(TURN_CHANNEL_CAPACITY);
    tokio::spawn(run_turn(store, provider, request, tx));
    rx
}

/// The producer side of one turn.
async fn run_turn(
    store: ConversationStore,
    provider: Arc<dyn AnswerProvider>,
    request: TurnRequest,
    tx: mpsc::Sender<TurnEvent>,
) {
    let conversation_id = request.conversation_id.clone();

    // The id goes out before anything else so the client can reconcile
    // a freshly created conversation even if the turn later fails.
    if tx
        .send(TurnEvent::ConversationId(conversation_id.clone()))
        .await
        .is_err()
    {
        debug!(conversation_id = %conversation_id, "Client left before turn start");
        return;
    }

    // Messages stored before this turn decide whether this is the first
    // exchange; the new user message is persisted right after, before the
    // provider is called, so it survives provider failures.
    let prior = match store.list_messages(&conversation_id).await {
        Ok(messages) => messages,
        Err(e) => {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to load history");
            let _ = tx.send(TurnEvent::Error(e.message)).await;
            return;
        }
    };
    let first_exchange = prior.is_empty();

    if let Err(e) = store
        .append_message(&conversation_id, MessageRole::User, &request.message)
        .await
    {
        warn!(conversation_id = %conversation_id, error = %e, "Failed to persist user message");
        let _ = tx.send(TurnEvent::Error(e.message)).await;
        return;
    }

    let ctx = AnswerContext {
        history: context_window(&prior),
        message: request.message.clone(),
        rag_instance: request.rag_instance.clone(),
    };

    let mut stream = match provider.stream_answer(ctx).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(conversation_id = %conversation_id, error = %e, "Answer backend refused the turn");
            let _ = tx.send(TurnEvent::Error(e.message)).await;
            return;
        }
    };

    let mut full_content = String::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                full_content.push_str(&fragment);
                if tx.send(TurnEvent::Content(fragment)).await.is_err() {
                    // Client disconnected mid-stream: stop pulling, skip
                    // finalization entirely.
                    info!(conversation_id = %conversation_id, "Turn aborted by client");
                    return;
                }
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Answer backend failed mid-stream");
                let _ = tx.send(TurnEvent::Error(e.message)).await;
                return;
            }
        }
    }

    // Finalize: assistant message, recency bump, title on first exchange.
    if let Err(e) = store
        .append_message(&conversation_id, MessageRole::Assistant, &full_content)
        .await
    {
        warn!(conversation_id = %conversation_id, error = %e, "Failed to persist assistant message");
        let _ = tx.send(TurnEvent::Error(e.message)).await;
        return;
    }

    if let Err(e) = store.touch_updated_at(&conversation_id).await {
        warn!(conversation_id = %conversation_id, error = %e, "Failed to bump conversation recency");
        let _ = tx.send(TurnEvent::Error(e.message)).await;
        return;
    }

    if first_exchange {
        let title = derive_title(&request.message);
        match store.set_title_if_unset(&conversation_id, &title).await {
            Ok(written) => {
                debug!(conversation_id = %conversation_id, written, "First-exchange title");
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Failed to set title");
                let _ = tx.send(TurnEvent::Error(e.message)).await;
                return;
            }
        }
    }

    let _ = tx.send(TurnEvent::Done).await;
}

/// The last few stored messages, oldest first, as provider context.
fn context_window(prior: &[Message]) -> Vec<TurnMessage> {
    let start = prior.len().saturating_sub(CONTEXT_WINDOW_MESSAGES);
    prior[start..]
        .iter()
        .map(|m| TurnMessage {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}
