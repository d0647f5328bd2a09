// ABOUTME: Identity endpoint and first-run onboarding flow
// ABOUTME: Creates the local account, first organization and first group in one request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Onboarding routes
//!
//! A verified identity without a local account is allowed exactly two
//! things: asking who it is (`GET /api/auth/me`) and onboarding
//! (`POST /api/onboarding`). Everything else requires the local account.

use crate::errors::AppError;
use crate::models::{Group, Organization, User};
use crate::resources::ServerResources;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Default name for the group created during onboarding
const DEFAULT_GROUP_NAME: &str = "General";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for the identity endpoint
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    /// Email from the session token
    pub email: String,
    /// Display name from the session token
    pub name: String,
    /// Local account, absent until onboarding completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Whether onboarding is still required
    pub onboarding_required: bool,
}

/// Request body for onboarding
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    /// Display name, defaults to the token claim
    #[serde(default)]
    pub name: Option<String>,
    /// Name of the first organization
    #[serde(default)]
    pub organization_name: Option<String>,
    /// Name of the first group, defaults to "General"
    #[serde(default)]
    pub group_name: Option<String>,
}

/// Response for a completed onboarding
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingResponse {
    /// The new local account
    pub user: User,
    /// The new organization, caller is its admin
    pub organization: Organization,
    /// The new group, caller is its first member
    pub group: Group,
}

// ============================================================================
// Routes
// ============================================================================

/// Onboarding route handlers
pub struct OnboardingRoutes;

impl OnboardingRoutes {
    /// Create all onboarding routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/me", get(Self::me))
            .route("/api/onboarding", post(Self::onboard))
            .with_state(resources)
    }

    /// Identity plus local-account state. Works before onboarding.
    async fn me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<MeResponse>, AppError> {
        let identity = resources.auth.authenticate(&headers)?;

        let user = resources
            .database
            .users()
            .get_by_external_id(&identity.external_id)
            .await?;

        let onboarding_required = user.is_none();
        Ok(Json(MeResponse {
            email: identity.email,
            name: identity.name,
            user,
            onboarding_required,
        }))
    }

    /// Create the local account with its first organization and group.
    async fn onboard(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<OnboardingRequest>,
    ) -> Result<Json<OnboardingResponse>, AppError> {
        let identity = resources.auth.authenticate(&headers)?;
        if !identity.email_verified {
            return Err(AppError::auth_invalid("Email address is not verified"));
        }

        let users = resources.database.users();
        if users.get_by_external_id(&identity.external_id).await?.is_some() {
            return Err(AppError::invalid_input("User is already onboarded"));
        }

        let organization_name = request
            .organization_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::missing_field("organizationName"))?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&identity.name)
            .to_owned();
        let group_name = request
            .group_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_GROUP_NAME);

        let user = users
            .create_user(&identity.external_id, &identity.email, &name, None)
            .await?;

        let organization = resources
            .database
            .orgs()
            .create_organization(organization_name, None, &user.id)
            .await?;

        let group = resources
            .database
            .groups()
            .create_group(&organization.id, group_name, None, None, &user.id)
            .await?;

        info!(
            user.id = %user.id,
            organization.id = %organization.id,
            group.id = %group.id,
            "Onboarding completed"
        );

        Ok(Json(OnboardingResponse {
            user,
            organization,
            group,
        }))
    }
}
