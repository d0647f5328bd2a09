// ABOUTME: Database operations for uploaded documents and their group assignments
// ABOUTME: Enforces the pending-to-terminal embedding status transition
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

use crate::errors::{AppError, AppResult};
use crate::models::{Document, EmbeddingStatus};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// Document database operations
pub struct DocumentManager {
    pool: SqlitePool,
}

impl DocumentManager {
    /// Create a new document manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an uploaded document with status `pending`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_document(
        &self,
        organization_id: &str,
        uploaded_by: &str,
        filename: &str,
        file_type: &str,
        file_size: i64,
        storage_key: &str,
    ) -> AppResult<Document> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO documents
                (id, organization_id, uploaded_by, filename, file_type, file_size,
                 storage_key, embedding_status, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            ",
        )
        .bind(&id)
        .bind(organization_id)
        .bind(uploaded_by)
        .bind(filename)
        .bind(file_type)
        .bind(file_size)
        .bind(storage_key)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create document: {e}")))?;

        Ok(Document {
            id,
            organization_id: organization_id.to_owned(),
            uploaded_by: uploaded_by.to_owned(),
            filename: filename.to_owned(),
            file_type: file_type.to_owned(),
            file_size,
            storage_key: storage_key.to_owned(),
            embedding_status: EmbeddingStatus::Pending,
            uploaded_at: now,
        })
    }

    /// Assign a document to a set of groups.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn assign_to_groups(&self, document_id: &str, group_ids: &[String]) -> AppResult<()> {
        for group_id in group_ids {
            sqlx::query(
                r"
                INSERT OR IGNORE INTO document_groups (id, document_id, group_id)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(document_id)
            .bind(group_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to assign document to group: {e}")))?;
        }

        Ok(())
    }

    /// Fetch one document.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get(&self, document_id: &str) -> AppResult<Option<Document>> {
        let row = sqlx::query(
            r"
            SELECT id, organization_id, uploaded_by, filename, file_type, file_size,
                   storage_key, embedding_status, uploaded_at
            FROM documents
            WHERE id = $1
            ",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get document: {e}")))?;

        row.map(row_to_document).transpose()
    }

    /// List the documents of an organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_for_org(&self, organization_id: &str) -> AppResult<Vec<Document>> {
        let rows = sqlx::query(
            r"
            SELECT id, organization_id, uploaded_by, filename, file_type, file_size,
                   storage_key, embedding_status, uploaded_at
            FROM documents
            WHERE organization_id = $1
            ORDER BY uploaded_at DESC
            ",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list documents: {e}")))?;

        rows.into_iter().map(row_to_document).collect()
    }

    /// Group ids a document is assigned to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn group_ids(&self, document_id: &str) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            r"
            SELECT group_id FROM document_groups WHERE document_id = $1
            ",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list document groups: {e}")))?;

        Ok(rows.into_iter().map(|r| r.get("group_id")).collect())
    }

    /// Delete a document record, cascading to group assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete(&self, document_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete document: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a pending document to a terminal status.
    ///
    /// Transitions other than pending→completed and pending→failed are
    /// rejected at the query level, so a stale sync outcome can never
    /// overwrite a terminal status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn resolve_embedding_status(
        &self,
        document_id: &str,
        status: EmbeddingStatus,
    ) -> AppResult<bool> {
        if status == EmbeddingStatus::Pending {
            return Err(AppError::invalid_input(
                "pending is not a terminal embedding status",
            ));
        }

        let result = sqlx::query(
            r"
            UPDATE documents
            SET embedding_status = $1
            WHERE id = $2 AND embedding_status = 'pending'
            ",
        )
        .bind(status.as_str())
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update embedding status: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_document(r: sqlx::sqlite::SqliteRow) -> AppResult<Document> {
    let status_raw: String = r.get("embedding_status");
    let embedding_status = EmbeddingStatus::from_str(&status_raw).map_err(AppError::database)?;

    Ok(Document {
        id: r.get("id"),
        organization_id: r.get("organization_id"),
        uploaded_by: r.get("uploaded_by"),
        filename: r.get("filename"),
        file_type: r.get("file_type"),
        file_size: r.get("file_size"),
        storage_key: r.get("storage_key"),
        embedding_status,
        uploaded_at: r.get("uploaded_at"),
    })
}
