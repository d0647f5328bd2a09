// ABOUTME: Read-only access-control predicates over memberships and ownership
// ABOUTME: Every route checks these before disclosing or mutating scoped data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::errors::{AppError, AppResult};
use crate::models::OrgRole;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Access-control predicates.
///
/// Strict group scoping: a user sees a group's conversations and documents
/// only through an explicit `group_members` row. Organization admins get no
/// implicit read access to group content.
pub struct AccessControl {
    pool: SqlitePool,
}

impl AccessControl {
    /// Create a new access-control handle
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The user's role in an organization, `None` when not a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn role_in_organization(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> AppResult<Option<OrgRole>> {
        let row = sqlx::query(
            r"
            SELECT role FROM organization_members
            WHERE user_id = $1 AND organization_id = $2
            ",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check organization role: {e}")))?;

        row.map(|r| {
            let raw: String = r.get("role");
            OrgRole::from_str(&raw).map_err(AppError::database)
        })
        .transpose()
    }

    /// Whether the user is an admin of the organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn is_org_admin(&self, user_id: &str, organization_id: &str) -> AppResult<bool> {
        Ok(self
            .role_in_organization(user_id, organization_id)
            .await?
            .is_some_and(|role| role == OrgRole::Admin))
    }

    /// Whether the user is an explicit member of the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn is_group_member(&self, user_id: &str, group_id: &str) -> AppResult<bool> {
        let row = sqlx::query(
            r"
            SELECT 1 AS present FROM group_members
            WHERE user_id = $1 AND group_id = $2
            ",
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check group membership: {e}")))?;

        Ok(row.is_some())
    }

    /// Whether the user owns the conversation. Absent conversations are not owned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn owns_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> AppResult<bool> {
        let row = sqlx::query(
            r"
            SELECT 1 AS present FROM conversations
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check conversation ownership: {e}")))?;

        Ok(row.is_some())
    }
}
