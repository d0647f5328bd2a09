// ABOUTME: Database operations for groups and group memberships
// ABOUTME: Creation bundles the creator's membership in one transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::errors::{AppError, AppResult};
use crate::models::{Group, GroupMember};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// A group denormalized with its organization name, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupWithOrg {
    /// The group
    #[serde(flatten)]
    pub group: Group,
    /// Owning organization's name
    pub organization_name: String,
}

/// Group database operations
pub struct GroupManager {
    pool: SqlitePool,
}

impl GroupManager {
    /// Create a new group manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a group and enroll the creator as its first member, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_group(
        &self,
        organization_id: &str,
        name: &str,
        description: Option<&str>,
        rag_instance_id: Option<&str>,
        creator_user_id: &str,
    ) -> AppResult<Group> {
        let id = Uuid::new_v4().to_string();
        let membership_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO groups (id, organization_id, name, description, rag_instance_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ",
        )
        .bind(&id)
        .bind(organization_id)
        .bind(name)
        .bind(description)
        .bind(rag_instance_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create group: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO group_members (id, user_id, group_id, joined_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&membership_id)
        .bind(creator_user_id)
        .bind(&id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to add creator membership: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit transaction: {e}")))?;

        Ok(Group {
            id,
            organization_id: organization_id.to_owned(),
            name: name.to_owned(),
            description: description.map(ToOwned::to_owned),
            rag_instance_id: rag_instance_id.map(ToOwned::to_owned),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Fetch one group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get(&self, group_id: &str) -> AppResult<Option<Group>> {
        let row = sqlx::query(
            r"
            SELECT id, organization_id, name, description, rag_instance_id, created_at, updated_at
            FROM groups
            WHERE id = $1
            ",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get group: {e}")))?;

        Ok(row.map(row_to_group))
    }

    /// List all groups in an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_for_org(&self, organization_id: &str) -> AppResult<Vec<Group>> {
        let rows = sqlx::query(
            r"
            SELECT id, organization_id, name, description, rag_instance_id, created_at, updated_at
            FROM groups
            WHERE organization_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list groups: {e}")))?;

        Ok(rows.into_iter().map(row_to_group).collect())
    }

    /// List the groups a user is an explicit member of, across organizations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<GroupWithOrg>> {
        let rows = sqlx::query(
            r"
            SELECT g.id, g.organization_id, g.name, g.description, g.rag_instance_id,
                   g.created_at, g.updated_at, o.name AS organization_name
            FROM groups g
            JOIN group_members gm ON gm.group_id = g.id
            JOIN organizations o ON o.id = g.organization_id
            WHERE gm.user_id = $1
            ORDER BY g.created_at ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list user groups: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let organization_name: String = r.get("organization_name");
                GroupWithOrg {
                    group: row_to_group(r),
                    organization_name,
                }
            })
            .collect())
    }

    /// Update group fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update(
        &self,
        group_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        rag_instance_id: Option<&str>,
    ) -> AppResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            UPDATE groups
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                rag_instance_id = COALESCE($3, rag_instance_id),
                updated_at = $4
            WHERE id = $5
            ",
        )
        .bind(name)
        .bind(description)
        .bind(rag_instance_id)
        .bind(&now)
        .bind(group_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update group: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a group, cascading to memberships and document assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete(&self, group_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete group: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Enroll a user into a group. No-op when the membership already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_member(&self, group_id: &str, user_id: &str) -> AppResult<GroupMember> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT OR IGNORE INTO group_members (id, user_id, group_id, joined_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(group_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add group member: {e}")))?;

        Ok(GroupMember {
            id,
            user_id: user_id.to_owned(),
            group_id: group_id.to_owned(),
            joined_at: now,
        })
    }

    /// Remove a user from a group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn remove_member(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM group_members
            WHERE group_id = $1 AND user_id = $2
            ",
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to remove group member: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_group(r: sqlx::sqlite::SqliteRow) -> Group {
    Group {
        id: r.get("id"),
        organization_id: r.get("organization_id"),
        name: r.get("name"),
        description: r.get("description"),
        rag_instance_id: r.get("rag_instance_id"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}
