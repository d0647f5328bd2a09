// ABOUTME: Group CRUD, membership-scoped listings and invite issuance
// ABOUTME: Mutations and invites need the organization admin role
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::database::groups::GroupWithOrg;
use crate::errors::AppError;
use crate::invites::IssuedInvite;
use crate::models::Group;
use crate::resources::ServerResources;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a group
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    /// Owning organization
    pub organization_id: String,
    /// Group name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Optional retrieval instance override
    #[serde(default)]
    pub rag_instance_id: Option<String>,
}

/// Request body for updating a group
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    /// New name
    #[serde(default)]
    pub name: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New retrieval instance
    #[serde(default)]
    pub rag_instance_id: Option<String>,
}

/// Response for group listings
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupListResponse {
    /// Groups visible to the caller
    pub groups: Vec<GroupWithOrg>,
}

/// Response for the per-organization group listing
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgGroupListResponse {
    /// Groups of the organization
    pub groups: Vec<Group>,
}

// ============================================================================
// Routes
// ============================================================================

/// Group route handlers
pub struct GroupRoutes;

impl GroupRoutes {
    /// Create all group routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/groups", get(Self::list))
            .route("/api/groups", post(Self::create))
            .route("/api/groups/:group_id", get(Self::get))
            .route("/api/groups/:group_id", patch(Self::update))
            .route("/api/groups/:group_id", delete(Self::remove))
            .route("/api/groups/:group_id/invite", post(Self::invite))
            .route("/api/organizations/:org_id/groups", get(Self::list_for_org))
            .with_state(resources)
    }

    /// Fetch the group or 404.
    async fn fetch_group(
        resources: &Arc<ServerResources>,
        group_id: &str,
    ) -> Result<Group, AppError> {
        resources
            .database
            .groups()
            .get(group_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group"))
    }

    /// Require the admin role in the group's organization.
    async fn require_org_admin(
        resources: &Arc<ServerResources>,
        user_id: &str,
        organization_id: &str,
    ) -> Result<(), AppError> {
        if resources
            .database
            .access()
            .is_org_admin(user_id, organization_id)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::permission_denied(
                "Only organization admins can do this",
            ))
        }
    }

    async fn list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<GroupListResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let groups = resources.database.groups().list_for_user(&user.id).await?;
        Ok(Json(GroupListResponse { groups }))
    }

    async fn list_for_org(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(org_id): Path<String>,
    ) -> Result<Json<OrgGroupListResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        if resources
            .database
            .access()
            .role_in_organization(&user.id, &org_id)
            .await?
            .is_none()
        {
            return Err(AppError::permission_denied(
                "You are not a member of this organization",
            ));
        }

        let groups = resources.database.groups().list_for_org(&org_id).await?;
        Ok(Json(OrgGroupListResponse { groups }))
    }

    async fn create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CreateGroupRequest>,
    ) -> Result<Json<Group>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        Self::require_org_admin(&resources, &user.id, &request.organization_id).await?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::missing_field("name"));
        }

        let group = resources
            .database
            .groups()
            .create_group(
                &request.organization_id,
                name,
                request.description.as_deref(),
                request.rag_instance_id.as_deref(),
                &user.id,
            )
            .await?;

        Ok(Json(group))
    }

    async fn get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<String>,
    ) -> Result<Json<Group>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        let group = Self::fetch_group(&resources, &group_id).await?;

        // Metadata is visible to explicit members and to org admins
        let access = resources.database.access();
        if !access.is_group_member(&user.id, &group_id).await?
            && !access.is_org_admin(&user.id, &group.organization_id).await?
        {
            return Err(AppError::permission_denied(
                "You do not have access to this group",
            ));
        }

        Ok(Json(group))
    }

    async fn update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<String>,
        Json(request): Json<UpdateGroupRequest>,
    ) -> Result<Json<Group>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        let group = Self::fetch_group(&resources, &group_id).await?;
        Self::require_org_admin(&resources, &user.id, &group.organization_id).await?;

        let groups = resources.database.groups();
        groups
            .update(
                &group_id,
                request.name.as_deref(),
                request.description.as_deref(),
                request.rag_instance_id.as_deref(),
            )
            .await?;

        Self::fetch_group(&resources, &group_id).await.map(Json)
    }

    async fn remove(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<String>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        let group = Self::fetch_group(&resources, &group_id).await?;
        Self::require_org_admin(&resources, &user.id, &group.organization_id).await?;

        resources.database.groups().delete(&group_id).await?;
        Ok(Json(serde_json::json!({ "deleted": true })))
    }

    /// Issue a shareable invite for this group.
    async fn invite(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<String>,
    ) -> Result<Json<IssuedInvite>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        let group = Self::fetch_group(&resources, &group_id).await?;
        Self::require_org_admin(&resources, &user.id, &group.organization_id).await?;

        let organization = resources
            .database
            .orgs()
            .get(&group.organization_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization"))?;

        let invite = resources
            .invites
            .create_invite(&group, &organization, &user)?;

        info!(group.id = %group.id, user.id = %user.id, "Invite issued");
        Ok(Json(invite))
    }
}
