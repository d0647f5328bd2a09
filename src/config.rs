// ABOUTME: Environment-driven server configuration with validated defaults
// ABOUTME: Collects HTTP, database, auth, answer-backend and storage settings in one struct
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Nova Contributors

//! Server configuration loaded from environment variables.

use crate::constants::network;
use crate::errors::{AppError, AppResult};
use std::env;
use std::path::PathBuf;

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the HTTP API
    pub http_port: u16,
    /// `SQLite` connection string
    pub database_url: String,
    /// Public base URL of the application, used when building invite links
    pub app_base_url: String,
    /// Session token validation settings
    pub auth: AuthConfig,
    /// Invite token settings
    pub invites: InviteConfig,
    /// Answer backend settings
    pub backend: BackendConfig,
    /// Blob storage settings
    pub storage: StorageConfig,
}

/// Session token validation settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for session JWT verification
    pub session_secret: String,
}

/// Invite token settings
#[derive(Debug, Clone)]
pub struct InviteConfig {
    /// HMAC secret for invite token signing, may equal the session secret
    pub secret: String,
}

/// Which answer backend serves chat turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// OpenAI-compatible `/chat/completions` with streaming
    ChatCompletion,
    /// Managed retrieval endpoint returning one complete answer per query
    AutoRag,
}

/// Answer backend settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Selected backend
    pub mode: BackendMode,
    /// Base URL of the backend API
    pub base_url: String,
    /// Bearer token for the backend API
    pub api_key: String,
    /// Model name, used by the chat-completion backend
    pub model: String,
    /// Default retrieval instance when a group has none configured
    pub default_rag_instance: String,
}

/// Blob storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory under which uploaded blobs are stored by key
    pub root: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a required variable is absent or
    /// a numeric variable fails to parse.
    pub fn from_env() -> AppResult<Self> {
        let http_port = match env::var("HTTP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| AppError::config(format!("Invalid HTTP_PORT '{value}': {e}")))?,
            Err(_) => network::DEFAULT_HTTP_PORT,
        };

        let session_secret = require_env("SESSION_SECRET")?;
        let invite_secret =
            env::var("INVITE_SECRET").unwrap_or_else(|_| session_secret.clone());

        let mode = match env::var("ANSWER_BACKEND").as_deref() {
            Ok("chat") => BackendMode::ChatCompletion,
            Ok("autorag") | Err(_) => BackendMode::AutoRag,
            Ok(other) => {
                return Err(AppError::config(format!(
                    "Unknown ANSWER_BACKEND '{other}', expected 'chat' or 'autorag'"
                )))
            }
        };

        Ok(Self {
            http_port,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/nova.db".into()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{http_port}")),
            auth: AuthConfig { session_secret },
            invites: InviteConfig {
                secret: invite_secret,
            },
            backend: BackendConfig {
                mode,
                base_url: require_env("BACKEND_BASE_URL")?,
                api_key: require_env("BACKEND_API_KEY")?,
                model: env::var("BACKEND_MODEL")
                    .unwrap_or_else(|_| "@cf/meta/llama-3.1-8b-instruct".into()),
                default_rag_instance: env::var("RAG_INSTANCE_ID")
                    .unwrap_or_else(|_| "nova-rag".into()),
            },
            storage: StorageConfig {
                root: env::var("STORAGE_ROOT")
                    .map_or_else(|_| PathBuf::from("./data/blobs"), PathBuf::from),
            },
        })
    }

    /// Summary string for startup logging, secrets redacted.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} db={} backend={:?} rag_instance={} storage={}",
            self.http_port,
            self.database_url,
            self.backend.mode,
            self.backend.default_rag_instance,
            self.storage.root.display()
        )
    }
}

fn require_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| {
        AppError::new(
            crate::errors::ErrorCode::ConfigMissing,
            format!("Missing required environment variable: {name}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_env_missing() {
        let err = require_env("NOVA_TEST_DOES_NOT_EXIST").unwrap_err();
        assert_eq!(err.http_status(), 500);
        assert!(err.message.contains("NOVA_TEST_DOES_NOT_EXIST"));
    }
}
