/// Session Validator
///
/// Turns a raw `Authorization` header into an authenticated user id.
/// Checks run cheapest first: header shape, revocation cache, signature
/// and expiry, then the subject claim.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::auth::jwt::TokenCodecs;
use crate::auth::revocation::RevocationCache;
use crate::error::AuthError;
use crate::identity::UserId;

const BEARER_PREFIX: &str = "Bearer ";

/// The caller of a protected request, as established by the validator.
///
/// Handlers receive this explicitly; it carries the token itself so flows
/// that must revoke the current session can do so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Extract the token from a `Bearer <token>` header value
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}

/// Read-only gate in front of every protected route
#[derive(Clone)]
pub struct SessionValidator {
    codecs: Arc<TokenCodecs>,
    revoked: Arc<RevocationCache>,
}

impl SessionValidator {
    pub fn new(codecs: Arc<TokenCodecs>, revoked: Arc<RevocationCache>) -> Self {
        Self { codecs, revoked }
    }

    /// # Errors
    /// Returns the precise `AuthError` cause; callers must surface it only as 401
    pub fn authenticate(&self, header: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        let token = header
            .and_then(extract_bearer)
            .ok_or(AuthError::MissingToken)?;

        // A poisoned token stays dead even if its signature and expiry still check out.
        if self.revoked.contains(token) {
            return Err(AuthError::TokenRevoked);
        }

        let claims = self.codecs.access.verify(token)?;

        if !claims.user_id.is_valid() {
            return Err(AuthError::InvalidSubject);
        }

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
            token: token.to_string(),
            expires_at: claims.expires_at,
        })
    }
}
