// ABOUTME: Request authentication against signed session tokens
// ABOUTME: Accepts session cookie or bearer header and resolves the local user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Authentication gate
//!
//! Every request carries a signed HS256 session token, either as a
//! `session_token` cookie or an `Authorization: Bearer` header. The cookie
//! is checked first. Verification yields an [`Identity`] from the token
//! claims; [`AuthGate::require_user`] additionally resolves the local
//! account, which only exists after onboarding.

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::User;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Identity-provider subject
    pub sub: String,
    /// Email address
    pub email: String,
    /// Whether the provider has verified the email
    #[serde(default)]
    pub email_verified: bool,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Expiry as a unix timestamp
    pub exp: i64,
}

/// Verified identity of a caller, before local-account resolution
#[derive(Debug, Clone)]
pub struct Identity {
    /// Identity-provider subject
    pub external_id: String,
    /// Email address
    pub email: String,
    /// Whether the email is verified
    pub email_verified: bool,
    /// Display name
    pub name: String,
}

/// Session token verifier
pub struct AuthGate {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
}

impl AuthGate {
    /// Create a gate validating tokens signed with `secret`
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Extract and verify the session token from request headers.
    ///
    /// Checks the `session_token` cookie first, then the `Authorization`
    /// bearer header.
    ///
    /// # Errors
    ///
    /// Returns an authentication error when no token is present or the
    /// token fails verification.
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<Identity> {
        let token = extract_token(headers).ok_or_else(AppError::auth_required)?;
        self.verify(&token)
    }

    /// Verify a raw session token.
    ///
    /// # Errors
    ///
    /// Returns an authentication error when the signature or expiry check fails.
    pub fn verify(&self, token: &str) -> AppResult<Identity> {
        let validation = Validation::default();
        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::auth_expired(),
                _ => AppError::auth_invalid(format!("Invalid session token: {e}")),
            })?;

        Ok(Identity {
            external_id: data.claims.sub,
            email: data.claims.email,
            email_verified: data.claims.email_verified,
            name: data.claims.name,
        })
    }

    /// Authenticate and resolve the local user account.
    ///
    /// # Errors
    ///
    /// Returns an authentication error for missing/invalid tokens or an
    /// unverified email, and an onboarding-required error when the identity
    /// has no local account yet.
    pub async fn require_user(
        &self,
        headers: &HeaderMap,
        database: &Database,
    ) -> AppResult<(Identity, User)> {
        let identity = self.authenticate(headers)?;

        if !identity.email_verified {
            return Err(AppError::auth_invalid("Email address is not verified"));
        }

        let user = database
            .users()
            .get_by_external_id(&identity.external_id)
            .await?
            .ok_or_else(AppError::onboarding_required)?;

        Ok((identity, user))
    }

    /// Issue a session token for an identity, valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_token(&self, identity: &Identity, ttl: Duration) -> AppResult<String> {
        let claims = SessionClaims {
            sub: identity.external_id.clone(),
            email: identity.email.clone(),
            email_verified: identity.email_verified,
            name: identity.name.clone(),
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign session token: {e}")))
    }
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    // Cookie first, bearer header second
    if let Some(cookie_header) = headers.get(axum::http::header::COOKIE) {
        if let Ok(cookies) = cookie_header.to_str() {
            for cookie in cookies.split(';') {
                let cookie = cookie.trim();
                if let Some(value) = cookie.strip_prefix("session_token=") {
                    if !value.is_empty() {
                        return Some(value.to_owned());
                    }
                }
            }
        }
    }

    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}
