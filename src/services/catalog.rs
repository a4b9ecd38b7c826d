//! Catalog service: the operation contract exposed to the HTTP layer

use std::sync::Arc;

use uuid::Uuid;

use super::validation;
use crate::{
    error::AppResult,
    models::book::{Book, BookCandidate, BookFilter},
    repository::BookStore,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn BookStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    /// Validate and insert a new book
    pub async fn create_book(&self, candidate: &BookCandidate) -> AppResult<Book> {
        let data = validation::validate_new(candidate)?;
        self.store.create(data).await
    }

    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.store.get(id).await
    }

    pub async fn list_books(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        self.store.list(filter).await
    }

    /// Apply a partial update; validation runs inside the store against the
    /// locked current record
    pub async fn update_book(&self, id: Uuid, patch: &BookCandidate) -> AppResult<Book> {
        self.store.update(id, patch).await
    }

    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        self.store.delete(id).await
    }

    /// Borrow one copy
    pub async fn decrement_availability(&self, id: Uuid) -> AppResult<Book> {
        self.store.decrement_availability(id).await
    }

    pub async fn count_books(&self) -> AppResult<u64> {
        self.store.count().await
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
