//! Repository layer: book storage backends

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::{
    config::{DatabaseConfig, StorageBackend, StorageConfig},
    error::AppResult,
    models::book::{Book, BookCandidate, BookFilter, NewBook},
};

pub use memory::MemoryBookStore;
pub use postgres::PgBookStore;

/// Keyed collection of book records.
///
/// Implementations own ISBN uniqueness and per-record write exclusion.
/// A failed call leaves the stored state untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert a validated record, assigning its id and timestamps
    async fn create(&self, data: NewBook) -> AppResult<Book>;

    async fn get(&self, id: Uuid) -> AppResult<Book>;

    /// Records matching every predicate of `filter`, in creation order
    async fn list(&self, filter: &BookFilter) -> AppResult<Vec<Book>>;

    /// Merge `patch` over the stored record, revalidate, and write it
    async fn update(&self, id: Uuid, patch: &BookCandidate) -> AppResult<Book>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Take one copy off the shelf; fails without writing when none are left
    async fn decrement_availability(&self, id: Uuid) -> AppResult<Book>;

    async fn count(&self) -> AppResult<u64>;

    /// Liveness probe for the readiness endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// Build the store selected by configuration. Runs migrations for postgres.
pub async fn connect(
    storage: &StorageConfig,
    database: &DatabaseConfig,
) -> AppResult<Arc<dyn BookStore>> {
    match storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory book store");
            Ok(Arc::new(MemoryBookStore::new()))
        }
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .min_connections(database.min_connections)
                .connect(&database.url)
                .await?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations completed");

            Ok(Arc::new(PgBookStore::new(pool)))
        }
    }
}
