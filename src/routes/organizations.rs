// ABOUTME: Organization CRUD and membership administration
// ABOUTME: Reads need membership, mutations need the admin role
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::database::orgs::{MemberView, OrganizationWithRole};
use crate::errors::AppError;
use crate::models::{Organization, OrgRole};
use crate::resources::ServerResources;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating an organization
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    /// Organization name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for updating an organization
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    /// New name
    #[serde(default)]
    pub name: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for changing a member's role
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    /// The new role
    pub role: OrgRole,
}

/// Response for the organization listing
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationListResponse {
    /// Organizations the caller belongs to
    pub organizations: Vec<OrganizationWithRole>,
}

/// Response for the member listing
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListResponse {
    /// Members of the organization
    pub members: Vec<MemberView>,
}

// ============================================================================
// Routes
// ============================================================================

/// Organization route handlers
pub struct OrganizationRoutes;

impl OrganizationRoutes {
    /// Create all organization routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/organizations", get(Self::list))
            .route("/api/organizations", post(Self::create))
            .route("/api/organizations/:org_id", get(Self::get))
            .route("/api/organizations/:org_id", patch(Self::update))
            .route("/api/organizations/:org_id", delete(Self::remove))
            .route("/api/organizations/:org_id/members", get(Self::list_members))
            .route(
                "/api/organizations/:org_id/members/:user_id",
                patch(Self::update_member),
            )
            .route(
                "/api/organizations/:org_id/members/:user_id",
                delete(Self::remove_member),
            )
            .with_state(resources)
    }

    /// Require membership, returning the caller's role.
    async fn require_membership(
        resources: &Arc<ServerResources>,
        user_id: &str,
        org_id: &str,
    ) -> Result<OrgRole, AppError> {
        resources
            .database
            .access()
            .role_in_organization(user_id, org_id)
            .await?
            .ok_or_else(|| {
                AppError::permission_denied("You are not a member of this organization")
            })
    }

    /// Require the admin role.
    async fn require_admin(
        resources: &Arc<ServerResources>,
        user_id: &str,
        org_id: &str,
    ) -> Result<(), AppError> {
        let role = Self::require_membership(resources, user_id, org_id).await?;
        if role == OrgRole::Admin {
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
    ) -> Result<Json<OrganizationListResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let organizations = resources.database.orgs().list_for_user(&user.id).await?;
        Ok(Json(OrganizationListResponse { organizations }))
    }

    async fn create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CreateOrganizationRequest>,
    ) -> Result<Json<Organization>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::missing_field("name"));
        }

        let organization = resources
            .database
            .orgs()
            .create_organization(name, request.description.as_deref(), &user.id)
            .await?;

        Ok(Json(organization))
    }

    async fn get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(org_id): Path<String>,
    ) -> Result<Json<Organization>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        Self::require_membership(&resources, &user.id, &org_id).await?;

        let organization = resources
            .database
            .orgs()
            .get(&org_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization"))?;

        Ok(Json(organization))
    }

    async fn update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(org_id): Path<String>,
        Json(request): Json<UpdateOrganizationRequest>,
    ) -> Result<Json<Organization>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        Self::require_admin(&resources, &user.id, &org_id).await?;

        let orgs = resources.database.orgs();
        let updated = orgs
            .update(&org_id, request.name.as_deref(), request.description.as_deref())
            .await?;
        if !updated {
            return Err(AppError::not_found("Organization"));
        }

        let organization = orgs
            .get(&org_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization"))?;

        Ok(Json(organization))
    }

    async fn remove(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(org_id): Path<String>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        Self::require_admin(&resources, &user.id, &org_id).await?;

        if !resources.database.orgs().delete(&org_id).await? {
            return Err(AppError::not_found("Organization"));
        }

        Ok(Json(serde_json::json!({ "deleted": true })))
    }

    async fn list_members(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(org_id): Path<String>,
    ) -> Result<Json<MemberListResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        Self::require_membership(&resources, &user.id, &org_id).await?;

        let members = resources.database.orgs().list_members(&org_id).await?;
        Ok(Json(MemberListResponse { members }))
    }

    async fn update_member(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((org_id, member_user_id)): Path<(String, String)>,
        Json(request): Json<UpdateMemberRequest>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        Self::require_admin(&resources, &user.id, &org_id).await?;

        let updated = resources
            .database
            .orgs()
            .update_member_role(&org_id, &member_user_id, request.role)
            .await?;
        if !updated {
            return Err(AppError::not_found("Membership"));
        }

        Ok(Json(serde_json::json!({ "updated": true })))
    }

    async fn remove_member(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((org_id, member_user_id)): Path<(String, String)>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;
        Self::require_admin(&resources, &user.id, &org_id).await?;

        if member_user_id == user.id {
            return Err(AppError::invalid_input(
                "Admins cannot remove themselves from the organization",
            ));
        }

        let removed = resources
            .database
            .orgs()
            .remove_member(&org_id, &member_user_id)
            .await?;
        if !removed {
            return Err(AppError::not_found("Membership"));
        }

        Ok(Json(serde_json::json!({ "removed": true })))
    }
}
