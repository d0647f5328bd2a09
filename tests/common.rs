// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides database, auth and workspace seeding helpers plus a scripted answer backend
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Nova Contributors
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
//! Shared test utilities for `nova_server` integration tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use nova_server::{
    auth::Identity,
    config::{AuthConfig, BackendConfig, BackendMode, InviteConfig, ServerConfig, StorageConfig},
    database::Database,
    errors::{AppError, AppResult},
    models::User,
    rag::{AnswerContext, AnswerProvider, AnswerStream},
    resources::ServerResources,
    routes,
};
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// What the scripted backend does when asked for an answer
#[derive(Debug, Clone)]
pub enum AnswerScript {
    /// Emit these fragments, then end normally
    Fragments(Vec<String>),
    /// Fail before any fragment is produced
    FailBeforeStream(String),
    /// Emit these fragments, then fail mid-stream
    FailMidStream(Vec<String>, String),
    /// Hold the stream until [`ScriptedBackend::release_gate`], then emit
    Gated(Vec<String>),
}

/// What the scripted backend does when asked to sync
#[derive(Debug, Clone)]
pub enum SyncScript {
    /// Report this job id
    Job(String),
    /// No indexing pipeline
    None,
    /// Fail the sync request
    Fail(String),
}

/// Scripted answer backend recording every context it was handed
pub struct ScriptedBackend {
    answer: AnswerScript,
    sync: SyncScript,
    contexts: Mutex<Vec<AnswerContext>>,
    gate: Arc<tokio::sync::Notify>,
}

impl ScriptedBackend {
    pub fn new(answer: AnswerScript) -> Self {
        Self {
            answer,
            sync: SyncScript::Job("sync-job-1".to_owned()),
            contexts: Mutex::new(Vec::new()),
            gate: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn with_sync(mut self, sync: SyncScript) -> Self {
        self.sync = sync;
        self
    }

    /// Contexts handed to `stream_answer`, in call order
    pub fn contexts(&self) -> Vec<AnswerContext> {
        self.contexts.lock().unwrap().clone()
    }

    /// Let a gated stream proceed.
    pub fn release_gate(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl AnswerProvider for ScriptedBackend {
    async fn stream_answer(&self, ctx: AnswerContext) -> AppResult<AnswerStream> {
        self.contexts.lock().unwrap().push(ctx);

        match self.answer.clone() {
            AnswerScript::Fragments(fragments) => Ok(Box::pin(futures_util::stream::iter(
                fragments.into_iter().map(Ok),
            ))),
            AnswerScript::FailBeforeStream(message) => {
                Err(AppError::external_service("answer-backend", message))
            }
            AnswerScript::FailMidStream(fragments, message) => {
                let items: Vec<AppResult<String>> = fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(AppError::external_service(
                        "answer-backend",
                        message,
                    ))))
                    .collect();
                Ok(Box::pin(futures_util::stream::iter(items)))
            }
            AnswerScript::Gated(fragments) => {
                let gate = self.gate.clone();
                Ok(Box::pin(async_stream::stream! {
                    gate.notified().await;
                    for fragment in fragments {
                        yield Ok(fragment);
                    }
                }))
            }
        }
    }

    async fn trigger_sync(&self, _rag_instance: Option<&str>) -> AppResult<Option<String>> {
        match self.sync.clone() {
            SyncScript::Job(job_id) => Ok(Some(job_id)),
            SyncScript::None => Ok(None),
            SyncScript::Fail(message) => {
                Err(AppError::external_service("answer-backend", message))
            }
        }
    }
}

/// A fully wired test application
pub struct TestApp {
    pub resources: Arc<ServerResources>,
    pub router: axum::Router,
    pub backend: Arc<ScriptedBackend>,
    storage_dir: TempDir,
}

impl TestApp {
    /// Build an app around an in-memory database and a scripted backend.
    pub async fn new(answer: AnswerScript) -> Result<Self> {
        Self::with_backend(ScriptedBackend::new(answer)).await
    }

    pub async fn with_backend(backend: ScriptedBackend) -> Result<Self> {
        init_test_logging();

        let storage_dir = TempDir::new()?;
        let config = test_config(&storage_dir);
        let database = Database::new(&config.database_url).await?;

        let backend = Arc::new(backend);
        let resources = Arc::new(ServerResources::with_backend(
            database,
            config,
            backend.clone(),
        ));
        let router = routes::api_router(resources.clone());

        Ok(Self {
            resources,
            router,
            backend,
            storage_dir,
        })
    }

    /// Issue a session token for an onboarded or fresh identity.
    pub fn token_for(&self, external_id: &str, email: &str, name: &str) -> String {
        let identity = Identity {
            external_id: external_id.to_owned(),
            email: email.to_owned(),
            email_verified: true,
            name: name.to_owned(),
        };
        self.resources
            .auth
            .issue_token(&identity, Duration::hours(1))
            .unwrap()
    }

    /// Issue a token whose email the identity provider has not verified.
    pub fn unverified_token_for(&self, external_id: &str, email: &str) -> String {
        let identity = Identity {
            external_id: external_id.to_owned(),
            email: email.to_owned(),
            email_verified: false,
            name: "Unverified".to_owned(),
        };
        self.resources
            .auth
            .issue_token(&identity, Duration::hours(1))
            .unwrap()
    }

    /// Create a local user account.
    pub async fn create_user(&self, external_id: &str, email: &str, name: &str) -> Result<User> {
        Ok(self
            .resources
            .database
            .users()
            .create_user(external_id, email, name, None)
            .await?)
    }
}

/// A seeded workspace: one user who admins one organization with one group
pub struct TestWorkspace {
    pub user: User,
    pub organization_id: String,
    pub group_id: String,
    pub bearer: String,
}

/// Seed a user, an organization they admin and a group they belong to.
pub async fn seed_workspace(app: &TestApp, external_id: &str, email: &str) -> Result<TestWorkspace> {
    let user = app.create_user(external_id, email, "Test User").await?;

    let organization = app
        .resources
        .database
        .orgs()
        .create_organization("Acme", Some("Test organization"), &user.id)
        .await?;

    let group = app
        .resources
        .database
        .groups()
        .create_group(&organization.id, "General", None, None, &user.id)
        .await?;

    let bearer = format!("Bearer {}", app.token_for(external_id, email, "Test User"));

    Ok(TestWorkspace {
        user,
        organization_id: organization.id,
        group_id: group.id,
        bearer,
    })
}

fn test_config(storage_dir: &TempDir) -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database_url: "sqlite::memory:".to_owned(),
        app_base_url: "http://localhost:3000".to_owned(),
        auth: AuthConfig {
            session_secret: "test-session-secret".to_owned(),
        },
        invites: InviteConfig {
            secret: "test-invite-secret".to_owned(),
        },
        backend: BackendConfig {
            mode: BackendMode::AutoRag,
            base_url: "http://localhost:9".to_owned(),
            api_key: "test-key".to_owned(),
            model: "test-model".to_owned(),
            default_rag_instance: "test-rag".to_owned(),
        },
        storage: StorageConfig {
            root: storage_dir.path().to_path_buf(),
        },
    }
}

/// Parse the data payloads out of a raw SSE body, in order.
pub fn sse_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(ToOwned::to_owned)
        .collect()
}
