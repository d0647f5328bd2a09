// ABOUTME: HTTP route assembly for the JSON API
// ABOUTME: Merges per-area routers and applies trace, request-id and CORS layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! HTTP routes.
//!
//! Each resource area exposes a `Routes` struct with a
//! `routes(Arc<ServerResources>)` constructor; [`api_router`] merges them
//! and applies the shared middleware stack.

pub mod chat;
pub mod conversations;
pub mod documents;
pub mod groups;
pub mod invites;
pub mod onboarding;
pub mod organizations;

pub use chat::ChatRoutes;
pub use conversations::ConversationRoutes;
pub use documents::DocumentRoutes;
pub use groups::GroupRoutes;
pub use invites::InviteRoutes;
pub use onboarding::OnboardingRoutes;
pub use organizations::OrganizationRoutes;

use crate::resources::ServerResources;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Assemble the complete API router.
#[must_use]
pub fn api_router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(ChatRoutes::routes(resources.clone()))
        .merge(ConversationRoutes::routes(resources.clone()))
        .merge(OnboardingRoutes::routes(resources.clone()))
        .merge(OrganizationRoutes::routes(resources.clone()))
        .merge(GroupRoutes::routes(resources.clone()))
        .merge(InviteRoutes::routes(resources.clone()))
        .merge(DocumentRoutes::routes(resources))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}
