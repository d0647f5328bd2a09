// ABOUTME: Shared server resources constructed once at startup
// ABOUTME: Single Arc-shared struct injected into every route handler
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! Dependency container.
//!
//! All shared state (database handle, auth gate, invite issuer, answer
//! backend, blob store) is constructed once in the binary and handed to the
//! routers as one `Arc<ServerResources>`. Handlers never reach for process
//! globals.

use crate::auth::AuthGate;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::invites::InviteIssuer;
use crate::rag::{AnswerBackend, AnswerProvider};
use crate::storage::BlobStore;
use std::sync::Arc;

/// Everything a request handler needs
pub struct ServerResources {
    /// Database handle
    pub database: Database,
    /// Session token verifier
    pub auth: AuthGate,
    /// Invite token issuer
    pub invites: InviteIssuer,
    /// Answer backend serving chat turns
    pub backend: Arc<dyn AnswerProvider>,
    /// Blob store for uploaded documents
    pub storage: BlobStore,
    /// Server configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Assemble resources from configuration and an opened database.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer backend cannot be constructed.
    pub fn new(database: Database, config: ServerConfig) -> AppResult<Self> {
        let backend = AnswerBackend::from_config(&config.backend)?;
        Ok(Self::with_backend(database, config, Arc::new(backend)))
    }

    /// Assemble resources around an already-built answer provider.
    #[must_use]
    pub fn with_backend(
        database: Database,
        config: ServerConfig,
        backend: Arc<dyn AnswerProvider>,
    ) -> Self {
        Self {
            database,
            auth: AuthGate::new(&config.auth.session_secret),
            invites: InviteIssuer::new(&config.invites.secret, &config.app_base_url),
            backend,
            storage: BlobStore::new(&config.storage),
            config,
        }
    }
}

impl std::fmt::Debug for ServerResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerResources").finish_non_exhaustive()
    }
}
