// ABOUTME: Document upload, listing and deletion with group assignment
// ABOUTME: Upload stores the blob, records the document and triggers one indexing sync
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Document routes
//!
//! Upload accepts the file content base64-encoded in the JSON body, writes
//! the blob under a generated key, records the document as `pending`,
//! assigns it to the requested groups (or every group of the organization
//! when org-wide), and triggers one indexing sync. A failed sync trigger
//! marks the document `failed` but never fails the upload itself.

use crate::constants::documents::MAX_FILE_SIZE;
use crate::errors::AppError;
use crate::models::{Document, EmbeddingStatus, OrgRole};
use crate::resources::ServerResources;
use crate::storage::generate_storage_key;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a document upload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    /// Owning organization
    pub organization_id: String,
    /// Original filename
    pub filename: String,
    /// MIME type
    pub content_type: String,
    /// File content, base64-encoded
    pub content_base64: String,
    /// Groups to assign the document to
    #[serde(default)]
    pub group_ids: Vec<String>,
    /// Assign to every group of the organization instead
    #[serde(default)]
    pub org_wide: bool,
}

/// Response for a completed upload
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentResponse {
    /// The recorded document
    pub document: Document,
    /// Sync job id when the backend reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_job_id: Option<String>,
}

/// Query parameters for the document listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsQuery {
    /// Organization to list
    pub organization_id: String,
}

/// Response for the document listing
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListResponse {
    /// Documents of the organization, newest first
    pub documents: Vec<Document>,
}

// ============================================================================
// Routes
// ============================================================================

/// Document route handlers
pub struct DocumentRoutes;

impl DocumentRoutes {
    /// Create all document routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/documents", get(Self::list))
            .route("/api/documents/upload", post(Self::upload))
            .route("/api/documents/:document_id", delete(Self::remove))
            // Base64 inflates the payload by a third, so the body cap sits
            // above the decoded file-size limit
            .layer(DefaultBodyLimit::max(MAX_FILE_SIZE * 2))
            .with_state(resources)
    }

    async fn upload(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<UploadDocumentRequest>,
    ) -> Result<Json<UploadDocumentResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        if resources
            .database
            .access()
            .role_in_organization(&user.id, &request.organization_id)
            .await?
            .is_none()
        {
            return Err(AppError::permission_denied(
                "You are not a member of this organization",
            ));
        }

        if request.filename.trim().is_empty() {
            return Err(AppError::missing_field("filename"));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&request.content_base64)
            .map_err(|e| AppError::invalid_input(format!("Invalid base64 content: {e}")))?;

        if bytes.is_empty() {
            return Err(AppError::invalid_input("File is empty"));
        }
        if bytes.len() > MAX_FILE_SIZE {
            return Err(AppError::invalid_input(format!(
                "File exceeds the {} MB limit",
                MAX_FILE_SIZE / (1024 * 1024)
            )));
        }

        // Resolve target groups before any side effect
        let groups = resources.database.groups();
        let group_ids: Vec<String> = if request.org_wide {
            groups
                .list_for_org(&request.organization_id)
                .await?
                .into_iter()
                .map(|g| g.id)
                .collect()
        } else {
            let mut ids = Vec::with_capacity(request.group_ids.len());
            for group_id in &request.group_ids {
                let group = groups
                    .get(group_id)
                    .await?
                    .filter(|g| g.organization_id == request.organization_id)
                    .ok_or_else(|| AppError::not_found("Group"))?;
                ids.push(group.id);
            }
            ids
        };

        let storage_key = generate_storage_key(&request.organization_id, &request.filename);
        resources.storage.put(&storage_key, &bytes).await?;

        let documents = resources.database.documents();
        let document = documents
            .create_document(
                &request.organization_id,
                &user.id,
                &request.filename,
                &request.content_type,
                bytes.len() as i64,
                &storage_key,
            )
            .await?;
        documents.assign_to_groups(&document.id, &group_ids).await?;

        // One sync per upload; its failure marks the document failed but
        // never fails the upload response.
        let sync_job_id = match resources.backend.trigger_sync(None).await {
            Ok(job_id) => {
                documents
                    .resolve_embedding_status(&document.id, EmbeddingStatus::Completed)
                    .await?;
                job_id
            }
            Err(e) => {
                warn!(document.id = %document.id, error = %e, "Indexing sync trigger failed");
                documents
                    .resolve_embedding_status(&document.id, EmbeddingStatus::Failed)
                    .await?;
                None
            }
        };

        let document = documents
            .get(&document.id)
            .await?
            .ok_or_else(|| AppError::not_found("Document"))?;

        info!(
            document.id = %document.id,
            organization.id = %request.organization_id,
            size = bytes.len(),
            groups = group_ids.len(),
            "Document uploaded"
        );

        Ok(Json(UploadDocumentResponse {
            document,
            sync_job_id,
        }))
    }

    async fn list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListDocumentsQuery>,
    ) -> Result<Json<DocumentListResponse>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        if resources
            .database
            .access()
            .role_in_organization(&user.id, &query.organization_id)
            .await?
            .is_none()
        {
            return Err(AppError::permission_denied(
                "You are not a member of this organization",
            ));
        }

        let documents = resources
            .database
            .documents()
            .list_for_org(&query.organization_id)
            .await?;

        Ok(Json(DocumentListResponse { documents }))
    }

    /// Delete a document: uploader or organization admin only.
    async fn remove(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(document_id): Path<String>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        let (_, user) = resources.auth.require_user(&headers, &resources.database).await?;

        let documents = resources.database.documents();
        let document = documents
            .get(&document_id)
            .await?
            .ok_or_else(|| AppError::not_found("Document"))?;

        let is_uploader = document.uploaded_by == user.id;
        let is_admin = resources
            .database
            .access()
            .role_in_organization(&user.id, &document.organization_id)
            .await?
            .is_some_and(|role| role == OrgRole::Admin);
        if !is_uploader && !is_admin {
            return Err(AppError::permission_denied(
                "Only the uploader or an organization admin can delete this document",
            ));
        }

        // Blob first; an orphaned record is worse than an orphaned blob
        if let Err(e) = resources.storage.delete(&document.storage_key).await {
            warn!(document.id = %document.id, error = %e, "Failed to delete blob");
        }
        documents.delete(&document_id).await?;

        Ok(Json(serde_json::json!({ "deleted": true })))
    }
}
