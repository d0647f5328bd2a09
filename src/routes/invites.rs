// ABOUTME: Invite acceptance flow turning a signed token into memberships
// ABOUTME: Adds the organization membership first when the joiner is new to the org
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::errors::AppError;
use crate::models::OrgRole;
use crate::resources::ServerResources;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Request body for accepting an invite
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteRequest {
    /// The signed invite token
    pub token: String,
}

/// Response for a successful acceptance
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    /// Joined group id
    pub group_id: String,
    /// Joined group name
    pub group_name: String,
    /// Organization id
    pub organization_id: String,
    /// Organization name
    pub organization_name: String,
}

/// Invite acceptance routes
pub struct InviteRoutes;

impl InviteRoutes {
    /// Create all invite routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/invite/accept", post(Self::accept))
            .with_state(resources)
    }

    /// Verify the token and enroll the caller.
    async fn accept(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<AcceptInviteRequest>,
    ) -> Result<Json<AcceptInviteResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let claims = resources.invites.verify(&request.token)?;

        // The group may have been deleted after the invite went out
        let group = resources
            .database
            .groups()
            .get(&claims.group_id)
            .await?
            .filter(|g| g.organization_id == claims.organization_id)
            .ok_or_else(|| AppError::not_found("Group"))?;

        let access = resources.database.access();
        if access.is_group_member(&user.id, &group.id).await? {
            return Err(AppError::invalid_input(
                "You are already a member of this group",
            ));
        }

        // Joining a group implies joining its organization
        if access
            .role_in_organization(&user.id, &group.organization_id)
            .await?
            .is_none()
        {
            resources
                .database
                .orgs()
                .add_member(&group.organization_id, &user.id, OrgRole::Member)
                .await?;
        }

        resources
            .database
            .groups()
            .add_member(&group.id, &user.id)
            .await?;

        let organization = resources
            .database
            .orgs()
            .get(&group.organization_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization"))?;

        info!(
            user.id = %user.id,
            group.id = %group.id,
            organization.id = %organization.id,
            "Invite accepted"
        );

        Ok(Json(AcceptInviteResponse {
            group_id: group.id,
            group_name: group.name,
            organization_id: organization.id,
            organization_name: organization.name,
        }))
    }
}
