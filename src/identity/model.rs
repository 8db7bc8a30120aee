/// Identity records
///
/// The durable account an access or refresh token refers to by its numeric id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Numeric handle of an identity, as carried in token claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Ids start at 1; zero never names a stored identity.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored account.
///
/// `password_hash` is never serialized, so the record can be returned to clients as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "userId")]
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Identity {
    /// Mark the account as disabled.
    ///
    /// # Errors
    /// Returns `InvalidState` if the account is already disabled
    pub fn disable(&mut self) -> Result<(), ValidationError> {
        if !self.is_active {
            return Err(ValidationError::InvalidState(
                "user has already been disabled".to_string(),
            ));
        }
        self.is_active = false;
        Ok(())
    }

    pub fn set_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
    }

    /// Staleness rule: a token issued before the last save of this identity is dead.
    pub fn predates_last_update(&self, issued_at: DateTime<Utc>) -> bool {
        issued_at < self.updated_at
    }
}

/// Data needed to create an identity; the store assigns id and timestamps
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
}
