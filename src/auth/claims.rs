/// Token Claims
///
/// The payload carried inside access and refresh tokens. Timing fields are
/// stored with microsecond precision so the staleness rule can order a token
/// against an identity update made moments later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::UserId;

/// The two independent kinds of session token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "issuedAt", with = "chrono::serde::ts_microseconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "expiresAt", with = "chrono::serde::ts_microseconds")]
    pub expires_at: DateTime<Utc>,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Claims for `user_id` issued at `now`, living for `ttl`.
    pub fn new(user_id: UserId, now: DateTime<Utc>, ttl: chrono::Duration, issuer: &str) -> Self {
        Self {
            user_id,
            issued_at: now,
            expires_at: now + ttl,
            iss: issuer.to_string(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
