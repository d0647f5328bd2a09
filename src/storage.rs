// ABOUTME: Blob storage for uploaded documents, addressed by generated keys
// ABOUTME: Keys embed organization, upload time and a sanitized filename
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Blob store
//!
//! Uploaded documents are stored as opaque blobs under generated keys of
//! the form `{organizationId}/{timestamp}-{randomSuffix}-{sanitizedFilename}`.
//! The organization prefix keeps tenants separated; timestamp plus random
//! suffix makes collisions for same-named files practically impossible.
//! This implementation writes blobs to the local filesystem under a
//! configured root.

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::PathBuf;
use tokio::fs;

/// Length of the random key suffix
const SUFFIX_LEN: usize = 6;

/// Replace every character outside `[a-zA-Z0-9._-]` with an underscore.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Generate a storage key for a new upload.
#[must_use]
pub fn generate_storage_key(organization_id: &str, filename: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!(
        "{organization_id}/{timestamp}-{suffix}-{}",
        sanitize_filename(filename)
    )
}

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a store writing under the configured root
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        // Keys are server-generated, but never allow traversal regardless
        if key.split('/').any(|segment| segment == "..") || key.starts_with('/') {
            return Err(AppError::storage(format!("Invalid storage key: {key}")));
        }
        Ok(self.root.join(key))
    }

    /// Store a blob under `key`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if writing fails.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(format!("Failed to create blob directory: {e}")))?;
        }

        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::storage(format!("Failed to write blob {key}: {e}")))
    }

    /// Fetch a blob.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for missing keys and a storage error otherwise.
    pub async fn get(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(key)?;

        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Blob {key}"))
            } else {
                AppError::storage(format!("Failed to read blob {key}: {e}"))
            }
        })
    }

    /// Delete a blob. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns a storage error if deletion fails for a reason other than absence.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage(format!(
                "Failed to delete blob {key}: {e}"
            ))),
        }
    }
}
