use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::identity::store::{next_update_time, store_now};
use crate::identity::{Identity, IdentityStore, NewIdentity, UserId};

#[derive(Default)]
struct Records {
    next_id: u64,
    by_id: HashMap<UserId, Identity>,
    id_by_email: HashMap<String, UserId>,
}

/// Process-local identity store.
///
/// Used by the test suite and by `backend: memory` deployments.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    records: RwLock<Records>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let mut records = self.records.write().await;

        if records.id_by_email.contains_key(&new.email) {
            return Err(StoreError::Duplicate("email already registered".to_string()));
        }

        records.next_id += 1;
        let id = UserId::new(records.next_id);
        let now = store_now();
        let identity = Identity {
            id,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
            is_active: true,
        };

        records.id_by_email.insert(identity.email.clone(), id);
        records.by_id.insert(id, identity.clone());
        Ok(identity)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Identity, StoreError> {
        let records = self.records.read().await;
        records.by_id.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Identity, StoreError> {
        let records = self.records.read().await;
        records
            .id_by_email
            .get(email)
            .and_then(|id| records.by_id.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<Identity, StoreError> {
        let mut records = self.records.write().await;
        let stored = records.by_id.get_mut(&id).ok_or(StoreError::NotFound)?;

        stored.set_password_hash(password_hash);
        stored.updated_at = next_update_time(stored.updated_at);

        Ok(stored.clone())
    }

    async fn deactivate(&self, id: UserId) -> Result<Identity, StoreError> {
        let mut records = self.records.write().await;
        let stored = records.by_id.get_mut(&id).ok_or(StoreError::NotFound)?;

        stored.disable().map_err(StoreError::Rejected)?;
        stored.updated_at = next_update_time(stored.updated_at);

        Ok(stored.clone())
    }
}
