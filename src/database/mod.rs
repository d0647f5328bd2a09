// ABOUTME: SQLite database plumbing, schema migration and manager construction
// ABOUTME: One Database handle owns the pool and hands out per-area managers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! Persistence layer.
//!
//! Everything is stored in `SQLite` through `sqlx`. Ids are uuid-v4 TEXT,
//! timestamps are RFC 3339 TEXT. Each functional area gets a manager struct
//! over the shared pool; [`Database::migrate`] creates the schema
//! idempotently on startup.

pub mod access;
pub mod conversations;
pub mod documents;
pub mod groups;
pub mod orgs;
pub mod users;

pub use access::AccessControl;
pub use conversations::ConversationStore;
pub use documents::DocumentManager;
pub use groups::GroupManager;
pub use orgs::OrganizationManager;
pub use users::UserManager;

use crate::errors::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Shared database handle
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `database_url` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        // In-memory databases exist per connection, so the pool must hold
        // exactly one and never recycle it
        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(if in_memory {
                None
            } else {
                Some(std::time::Duration::from_secs(600))
            })
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Access the underlying pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// User account operations
    #[must_use]
    pub fn users(&self) -> UserManager {
        UserManager::new(self.pool.clone())
    }

    /// Organization and membership operations
    #[must_use]
    pub fn orgs(&self) -> OrganizationManager {
        OrganizationManager::new(self.pool.clone())
    }

    /// Group and group-membership operations
    #[must_use]
    pub fn groups(&self) -> GroupManager {
        GroupManager::new(self.pool.clone())
    }

    /// Document operations
    #[must_use]
    pub fn documents(&self) -> DocumentManager {
        DocumentManager::new(self.pool.clone())
    }

    /// Conversation and message operations
    #[must_use]
    pub fn conversations(&self) -> ConversationStore {
        ConversationStore::new(self.pool.clone())
    }

    /// Read-only access predicates
    #[must_use]
    pub fn access(&self) -> AccessControl {
        AccessControl::new(self.pool.clone())
    }

    /// Create the schema if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(&self) -> AppResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                avatar_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS organization_members (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                role TEXT NOT NULL DEFAULT 'member',
                joined_at TEXT NOT NULL,
                UNIQUE(user_id, organization_id)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                rag_instance_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS group_members (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                joined_at TEXT NOT NULL,
                UNIQUE(user_id, group_id)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                uploaded_by TEXT NOT NULL REFERENCES users(id),
                filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                storage_key TEXT NOT NULL,
                embedding_status TEXT NOT NULL DEFAULT 'pending',
                uploaded_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS document_groups (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                UNIQUE(document_id, group_id)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                title TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at)
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_conversations_user
                ON conversations(user_id, updated_at)
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_group_members_user
                ON group_members(user_id)
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_documents_org
                ON documents(organization_id)
            ",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
