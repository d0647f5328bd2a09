// ABOUTME: Database operations for local user accounts
// ABOUTME: Maps external identity subjects to local users created during onboarding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::errors::{AppError, AppResult};
use crate::models::User;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// User account database operations
pub struct UserManager {
    pool: SqlitePool,
}

impl UserManager {
    /// Create a new user manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a local user bound to an external identity subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, including when a
    /// user with the same external id already exists.
    pub async fn create_user(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
        avatar_url: Option<&str>,
    ) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO users (id, external_id, email, name, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ",
        )
        .bind(&id)
        .bind(external_id)
        .bind(email)
        .bind(name)
        .bind(avatar_url)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create user: {e}")))?;

        Ok(User {
            id,
            external_id: external_id.to_owned(),
            email: email.to_owned(),
            name: name.to_owned(),
            avatar_url: avatar_url.map(ToOwned::to_owned),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Look up a user by the identity-provider subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, external_id, email, name, avatar_url, created_at, updated_at
            FROM users
            WHERE external_id = $1
            ",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;

        Ok(row.map(row_to_user))
    }

    /// Look up a user by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_by_id(&self, user_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, external_id, email, name, avatar_url, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;

        Ok(row.map(row_to_user))
    }

    /// Refresh name and avatar from the identity provider claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar_url: Option<&str>,
    ) -> AppResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            UPDATE users
            SET name = $1, avatar_url = $2, updated_at = $3
            WHERE id = $4
            ",
        )
        .bind(name)
        .bind(avatar_url)
        .bind(&now)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update user profile: {e}")))?;

        Ok(())
    }
}

fn row_to_user(r: sqlx::sqlite::SqliteRow) -> User {
    User {
        id: r.get("id"),
        external_id: r.get("external_id"),
        email: r.get("email"),
        name: r.get("name"),
        avatar_url: r.get("avatar_url"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}
