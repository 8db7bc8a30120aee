use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use crate::error::StoreError;
use crate::identity::{Identity, NewIdentity, UserId};

/// Persistent storage for identities.
///
/// Implementations own per-record atomicity: each update touches only its
/// own field, so concurrent updates of one identity never undo each other.
/// Every successful update must advance `updated_at` (never backwards),
/// since that timestamp is what invalidates refresh tokens issued before it.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new, active identity.
    ///
    /// # Errors
    /// `StoreError::Duplicate` if the email is already registered
    async fn insert(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Identity, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Identity, StoreError>;

    /// Replace the password hash and bump `updated_at`. Returns the record as stored.
    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<Identity, StoreError>;

    /// Disable an active identity and bump `updated_at`. Returns the record as stored.
    ///
    /// # Errors
    /// `StoreError::Rejected` if the identity is already disabled
    async fn deactivate(&self, id: UserId) -> Result<Identity, StoreError>;
}

/// Current time at the microsecond precision every backend can store.
pub(crate) fn store_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next `updated_at` for a record last saved at `previous`.
pub(crate) fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    store_now().max(previous)
}
