// ABOUTME: Core domain models shared between the database layer and the HTTP API
// ABOUTME: Users, organizations, groups, documents, conversations and messages
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Nova Contributors

//! Domain model types.
//!
//! All ids are uuid-v4 strings and all timestamps are RFC 3339 strings,
//! matching their TEXT representation in `SQLite`. API serialization uses
//! camelCase field names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A local user account, linked to an external identity by `external_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Internal id
    pub id: String,
    /// Identity-provider subject this account is bound to
    pub external_id: String,
    /// Email address
    pub email: String,
    /// Display name
    pub name: String,
    /// Optional avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// An organization, the tenancy boundary for documents and groups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Internal id
    pub id: String,
    /// Organization name
    pub name: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// Role of a user within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    /// Full control over the organization
    Admin,
    /// Can manage groups and documents
    Manager,
    /// Regular participant
    Member,
    /// Read-only participant
    Viewer,
}

impl OrgRole {
    /// Database representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }
}

impl FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown organization role: {other}")),
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership of a user in an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMember {
    /// Internal id
    pub id: String,
    /// Member user id
    pub user_id: String,
    /// Organization id
    pub organization_id: String,
    /// Role within the organization
    pub role: OrgRole,
    /// Join timestamp (RFC 3339)
    pub joined_at: String,
}

/// A group: the unit of knowledge scoping within an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Internal id
    pub id: String,
    /// Owning organization
    pub organization_id: String,
    /// Group name
    pub name: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Retrieval instance serving this group, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_instance_id: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// Membership of a user in a group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// Internal id
    pub id: String,
    /// Member user id
    pub user_id: String,
    /// Group id
    pub group_id: String,
    /// Join timestamp (RFC 3339)
    pub joined_at: String,
}

/// Embedding pipeline state of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    /// Uploaded, not yet indexed
    Pending,
    /// Indexed and searchable
    Completed,
    /// Indexing failed
    Failed,
}

impl EmbeddingStatus {
    /// Database representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for EmbeddingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown embedding status: {other}")),
        }
    }
}

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Internal id
    pub id: String,
    /// Owning organization
    pub organization_id: String,
    /// Uploading user id
    pub uploaded_by: String,
    /// Original filename
    pub filename: String,
    /// MIME type as supplied by the uploader
    pub file_type: String,
    /// Size in bytes
    pub file_size: i64,
    /// Blob storage key
    pub storage_key: String,
    /// Indexing state
    pub embedding_status: EmbeddingStatus,
    /// Upload timestamp (RFC 3339)
    pub uploaded_at: String,
}

/// A conversation owned by one user within one group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Internal id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Group scoping the conversation
    pub group_id: String,
    /// Derived title, unset until the first exchange completes
    pub title: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last completed-turn timestamp (RFC 3339)
    pub updated_at: String,
}

/// Author of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Human participant
    User,
    /// Answer backend
    Assistant,
}

impl MessageRole {
    /// Database representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// A stored chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Internal id
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Author role
    pub role: MessageRole,
    /// Full text content
    pub content: String,
    /// Append timestamp (RFC 3339)
    pub created_at: String,
}
