use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{StoreError, ValidationError};
use crate::identity::store::store_now;
use crate::identity::{Identity, IdentityStore, NewIdentity, UserId};

type IdentityRow = (i64, String, String, DateTime<Utc>, DateTime<Utc>, bool);

/// Identity store backed by the `users` table (see `migrations/`)
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_identity(row: IdentityRow) -> Result<Identity, StoreError> {
    let (id, email, password_hash, created_at, updated_at, is_active) = row;
    let id = u64::try_from(id)
        .map_err(|_| StoreError::Backend(format!("negative user id {} in users table", id)))?;

    Ok(Identity {
        id: UserId::new(id),
        email,
        password_hash,
        created_at,
        updated_at,
        is_active,
    })
}

fn to_db_id(id: UserId) -> Result<i64, StoreError> {
    // Anything above i64::MAX cannot exist in a BIGSERIAL column.
    i64::try_from(id.get()).map_err(|_| StoreError::NotFound)
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let now = store_now();
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            INSERT INTO users (email, password_hash, created_at, updated_at, is_active)
            VALUES ($1, $2, $3, $3, true)
            RETURNING id, email, password_hash, created_at, updated_at, is_active
            "#,
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        to_identity(row)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Identity, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, password_hash, created_at, updated_at, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(to_db_id(id)?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        to_identity(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Identity, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, password_hash, created_at, updated_at, is_active
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        to_identity(row)
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<Identity, StoreError> {
        // updated_at never moves backwards, whichever node wrote last.
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            UPDATE users
            SET password_hash = $2,
                updated_at = GREATEST($3, updated_at)
            WHERE id = $1
            RETURNING id, email, password_hash, created_at, updated_at, is_active
            "#,
        )
        .bind(to_db_id(id)?)
        .bind(&password_hash)
        .bind(store_now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        to_identity(row)
    }

    async fn deactivate(&self, id: UserId) -> Result<Identity, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            UPDATE users
            SET is_active = false,
                updated_at = GREATEST($2, updated_at)
            WHERE id = $1 AND is_active
            RETURNING id, email, password_hash, created_at, updated_at, is_active
            "#,
        )
        .bind(to_db_id(id)?)
        .bind(store_now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => to_identity(row),
            None => {
                // No row changed: either the id is unknown or the account is already disabled.
                self.find_by_id(id).await?;
                Err(StoreError::Rejected(ValidationError::InvalidState(
                    "user has already been disabled".to_string(),
                )))
            }
        }
    }
}
