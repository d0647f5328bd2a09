// ABOUTME: Central constants for protocol limits, defaults and service identifiers
// ABOUTME: Single place to tune context window size, title policy and streaming behavior
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Nova Contributors

//! Application-wide constants.

/// Service identifiers used in logs and error messages
pub mod service_names {
    /// Name of this server
    pub const NOVA_SERVER: &str = "nova-server";
    /// Label for the answer backend in external-service errors
    pub const ANSWER_BACKEND: &str = "answer-backend";
    /// Label for blob storage in external-service errors
    pub const BLOB_STORE: &str = "blob-store";
}

/// Chat-turn pipeline limits
pub mod chat {
    /// Number of stored messages included as model context for a turn
    pub const CONTEXT_WINDOW_MESSAGES: usize = 10;
    /// Maximum characters of the first user message used as the conversation title
    pub const TITLE_MAX_CHARS: usize = 50;
    /// Suffix appended when the derived title is truncated
    pub const TITLE_ELLIPSIS: &str = "...";
    /// Capacity of the bounded channel between turn producer and SSE consumer
    pub const TURN_CHANNEL_CAPACITY: usize = 16;
    /// Terminator line of the chat-turn SSE stream
    pub const STREAM_DONE_MARKER: &str = "[DONE]";
}

/// Answer-backend tuning
pub mod rag {
    use std::time::Duration;

    /// Delay between re-chunked words when a backend returns a complete answer
    pub const SIMULATED_STREAM_DELAY: Duration = Duration::from_millis(10);
    /// Connect timeout for outbound backend requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// End-to-end timeout for a single backend request, streaming included
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Invite token policy
pub mod invites {
    /// Days before an issued invite token expires
    pub const INVITE_EXPIRY_DAYS: i64 = 7;
}

/// Document upload limits
pub mod documents {
    /// Maximum accepted upload size in bytes (10 MB)
    pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
}

/// Network defaults
pub mod network {
    /// Default HTTP port when none is configured
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}
