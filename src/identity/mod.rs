/// Identity module
///
/// The account record, the storage trait the session flows depend on,
/// and the backends selectable at startup.

mod memory;
mod model;
mod postgres;
mod store;

pub use memory::InMemoryIdentityStore;
pub use model::{Identity, NewIdentity, UserId};
pub use postgres::PgIdentityStore;
pub use store::IdentityStore;

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use crate::configuration::{DatabaseSettings, StoreBackend};
use crate::error::StoreError;

/// Build the identity store chosen by configuration.
///
/// This is the only place that knows which backend is in use.
pub async fn build_store(settings: &DatabaseSettings) -> Result<Arc<dyn IdentityStore>, StoreError> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory identity store");
            Ok(Arc::new(InMemoryIdentityStore::new()))
        }
        StoreBackend::Postgres => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(&settings.connection_string())
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to create connection pool: {}", e)))?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to migrate the database: {}", e)))?;

            tracing::info!("Database connection pool created successfully");
            Ok(Arc::new(PgIdentityStore::new(pool)))
        }
    }
}
