// ABOUTME: Signed invite tokens granting entry into one group
// ABOUTME: Stateless HS256 capabilities with a fixed expiry and no revocation list
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Group invites
//!
//! An invite is a signed, self-contained capability naming one group and
//! its organization. Nothing is stored server-side: possession of an
//! unexpired token is sufficient to join, and issued tokens cannot be
//! revoked before they expire.

use crate::constants::invites::INVITE_EXPIRY_DAYS;
use crate::errors::{AppError, AppResult};
use crate::models::{Group, Organization, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an invite token.
///
/// Names travel in the token so the acceptance page can describe the
/// invitation without a server round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteClaims {
    /// Group the invite admits into
    pub group_id: String,
    /// Group name at issuance time
    pub group_name: String,
    /// Organization owning the group
    pub organization_id: String,
    /// Organization name at issuance time
    pub organization_name: String,
    /// User id of the issuing admin
    pub invited_by: String,
    /// Display name of the issuing admin
    pub invited_by_name: String,
    /// Issuance as a unix timestamp
    pub iat: i64,
    /// Expiry as a unix timestamp
    pub exp: i64,
}

/// A freshly issued invite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedInvite {
    /// The signed token
    pub token: String,
    /// Shareable acceptance URL
    pub invite_url: String,
}

/// Issues and verifies invite tokens
pub struct InviteIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    app_base_url: String,
}

impl InviteIssuer {
    /// Create an issuer signing with `secret`; URLs are rooted at `app_base_url`.
    #[must_use]
    pub fn new(secret: &str, app_base_url: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            app_base_url: app_base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Sign an invite for a group, valid for seven days.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn create_invite(
        &self,
        group: &Group,
        organization: &Organization,
        invited_by: &User,
    ) -> AppResult<IssuedInvite> {
        let now = Utc::now();
        let claims = InviteClaims {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            organization_id: organization.id.clone(),
            organization_name: organization.name.clone(),
            invited_by: invited_by.id.clone(),
            invited_by_name: invited_by.name.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::days(INVITE_EXPIRY_DAYS)).timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign invite token: {e}")))?;

        let invite_url = format!("{}/invite?token={token}", self.app_base_url);

        Ok(IssuedInvite { token, invite_url })
    }

    /// Verify signature and expiry of an invite token.
    ///
    /// Both tampering and expiry are caller errors (the token came from a
    /// URL), so both map to validation failures.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed, tampered or expired tokens.
    pub fn verify(&self, token: &str) -> AppResult<InviteClaims> {
        let validation = Validation::default();
        let data = decode::<InviteClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::invalid_input("Invitation has expired")
                }
                _ => AppError::invalid_input("Invalid invitation token"),
            }
        })?;

        Ok(data.claims)
    }
}

impl std::fmt::Debug for InviteIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteIssuer")
            .field("app_base_url", &self.app_base_url)
            .finish_non_exhaustive()
    }
}
