// ABOUTME: Database operations for organizations and organization memberships
// ABOUTME: Creation bundles the creator's admin membership in one transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::errors::{AppError, AppResult};
use crate::models::{Organization, OrganizationMember, OrgRole};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// An organization together with the caller's role in it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationWithRole {
    /// The organization
    #[serde(flatten)]
    pub organization: Organization,
    /// Caller's role
    pub role: OrgRole,
}

/// Listing view of one organization member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    /// Membership row id
    pub id: String,
    /// Member user id
    pub user_id: String,
    /// Member display name
    pub name: String,
    /// Member email
    pub email: String,
    /// Role within the organization
    pub role: OrgRole,
    /// Join timestamp (RFC 3339)
    pub joined_at: String,
}

/// Organization database operations
pub struct OrganizationManager {
    pool: SqlitePool,
}

impl OrganizationManager {
    /// Create a new organization manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an organization and make the creator its admin, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_organization(
        &self,
        name: &str,
        description: Option<&str>,
        creator_user_id: &str,
    ) -> AppResult<Organization> {
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
            INSERT INTO organizations (id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ",
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create organization: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO organization_members (id, user_id, organization_id, role, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&membership_id)
        .bind(creator_user_id)
        .bind(&id)
        .bind(OrgRole::Admin.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to add creator membership: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit transaction: {e}")))?;

        Ok(Organization {
            id,
            name: name.to_owned(),
            description: description.map(ToOwned::to_owned),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Fetch one organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get(&self, org_id: &str) -> AppResult<Option<Organization>> {
        let row = sqlx::query(
            r"
            SELECT id, name, description, created_at, updated_at
            FROM organizations
            WHERE id = $1
            ",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get organization: {e}")))?;

        Ok(row.map(row_to_organization))
    }

    /// List the organizations a user belongs to, with the user's role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<OrganizationWithRole>> {
        let rows = sqlx::query(
            r"
            SELECT o.id, o.name, o.description, o.created_at, o.updated_at, m.role
            FROM organizations o
            JOIN organization_members m ON m.organization_id = o.id
            WHERE m.user_id = $1
            ORDER BY o.created_at ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list organizations: {e}")))?;

        rows.into_iter()
            .map(|r| {
                let role = parse_role(&r.get::<String, _>("role"))?;
                Ok(OrganizationWithRole {
                    organization: row_to_organization(r),
                    role,
                })
            })
            .collect()
    }

    /// Update name and/or description.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update(
        &self,
        org_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> AppResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            UPDATE organizations
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                updated_at = $3
            WHERE id = $4
            ",
        )
        .bind(name)
        .bind(description)
        .bind(&now)
        .bind(org_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update organization: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an organization, cascading to memberships, groups and documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete(&self, org_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(org_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete organization: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// List all members with user details.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_members(&self, org_id: &str) -> AppResult<Vec<MemberView>> {
        let rows = sqlx::query(
            r"
            SELECT m.id, m.user_id, u.name, u.email, m.role, m.joined_at
            FROM organization_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
            ORDER BY m.joined_at ASC
            ",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list members: {e}")))?;

        rows.into_iter()
            .map(|r| {
                Ok(MemberView {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    name: r.get("name"),
                    email: r.get("email"),
                    role: parse_role(&r.get::<String, _>("role"))?,
                    joined_at: r.get("joined_at"),
                })
            })
            .collect()
    }

    /// Add a member. No-op when the membership already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_member(
        &self,
        org_id: &str,
        user_id: &str,
        role: OrgRole,
    ) -> AppResult<OrganizationMember> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT OR IGNORE INTO organization_members (id, user_id, organization_id, role, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(org_id)
        .bind(role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add member: {e}")))?;

        Ok(OrganizationMember {
            id,
            user_id: user_id.to_owned(),
            organization_id: org_id.to_owned(),
            role,
            joined_at: now,
        })
    }

    /// Change a member's role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_member_role(
        &self,
        org_id: &str,
        user_id: &str,
        role: OrgRole,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE organization_members
            SET role = $1
            WHERE organization_id = $2 AND user_id = $3
            ",
        )
        .bind(role.as_str())
        .bind(org_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update member role: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a member from the organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn remove_member(&self, org_id: &str, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM organization_members
            WHERE organization_id = $1 AND user_id = $2
            ",
        )
        .bind(org_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to remove member: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_organization(r: sqlx::sqlite::SqliteRow) -> Organization {
    Organization {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn parse_role(raw: &str) -> AppResult<OrgRole> {
    OrgRole::from_str(raw).map_err(AppError::database)
}
