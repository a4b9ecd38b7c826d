//! In-process book store.
//!
//! Every record lives in its own slot behind an `RwLock`, so writers on
//! different ids never contend. The ISBN index has a single mutex, taken
//! only by writes that claim an ISBN: create, and an update that changes it.
//!
//! Lock order: ISBN index, then record map, then record slot. A slot guard
//! is never held while waiting on the index or the record map.
//!
//! Delete releases its ISBN only when the index is free. An index entry whose
//! record is gone is stale and does not count as an owner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use uuid::Uuid;

use super::BookStore;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookCandidate, BookFilter, NewBook},
    services::validation,
};

/// `None` once the record has been deleted
type Slot = Arc<RwLock<Option<Book>>>;

fn poisoned<T>(_: PoisonError<T>) -> AppError {
    AppError::StorageUnavailable("Lock poisoned".to_string())
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(id.to_string())
}

#[derive(Debug, Default)]
pub struct MemoryBookStore {
    isbns: Mutex<HashMap<String, Uuid>>,
    books: RwLock<IndexMap<Uuid, Slot>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: Uuid) -> AppResult<Slot> {
        let books = self.books.read().map_err(poisoned)?;
        books.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    /// Live record holding `isbn`, looked up under the caller's index guard
    fn isbn_owner(&self, isbns: &HashMap<String, Uuid>, isbn: &str) -> AppResult<Option<Uuid>> {
        let Some(id) = isbns.get(isbn).copied() else {
            return Ok(None);
        };
        let books = self.books.read().map_err(poisoned)?;
        let Some(slot) = books.get(&id) else {
            return Ok(None);
        };
        let live = slot.read().map_err(poisoned)?.as_ref().is_some_and(|b| b.isbn == isbn);
        Ok(live.then_some(id))
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn create(&self, data: NewBook) -> AppResult<Book> {
        let mut isbns = self.isbns.lock().map_err(poisoned)?;
        if self.isbn_owner(&isbns, &data.isbn)?.is_some() {
            tracing::info!(isbn = %data.isbn, "Rejected duplicate ISBN");
            return Err(AppError::DuplicateField("isbn"));
        }

        let book = Book::from_new(Uuid::new_v4(), data, Utc::now());
        self.books
            .write()
            .map_err(poisoned)?
            .insert(book.id, Arc::new(RwLock::new(Some(book.clone()))));
        isbns.insert(book.isbn.clone(), book.id);

        tracing::debug!(book_id = %book.id, isbn = %book.isbn, "Book created");
        Ok(book)
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        let slot = self.slot(id)?;
        let record = slot.read().map_err(poisoned)?;
        record.clone().ok_or_else(|| not_found(id))
    }

    async fn list(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let books = self.books.read().map_err(poisoned)?;
        let mut result = Vec::new();
        for slot in books.values() {
            let record = slot.read().map_err(poisoned)?;
            if let Some(book) = record.as_ref().filter(|b| filter.matches(b)) {
                result.push(book.clone());
            }
        }
        Ok(result)
    }

    async fn update(&self, id: Uuid, patch: &BookCandidate) -> AppResult<Book> {
        let slot = self.slot(id)?;
        let target = {
            let mut record = slot.write().map_err(poisoned)?;
            let current = record.as_mut().ok_or_else(|| not_found(id))?;
            let data = validation::validate_patch(patch, current)?;
            if data.isbn == current.isbn {
                current.apply(data, Utc::now());
                tracing::debug!(book_id = %id, "Book updated");
                return Ok(current.clone());
            }
            data.isbn
        };

        // The ISBN moves: claim it under the index, then rewrite the record
        let mut isbns = self.isbns.lock().map_err(poisoned)?;
        if self.isbn_owner(&isbns, &target)?.is_some_and(|owner| owner != id) {
            tracing::info!(book_id = %id, isbn = %target, "Rejected duplicate ISBN");
            return Err(AppError::DuplicateField("isbn"));
        }

        let slot = self.slot(id)?;
        let mut record = slot.write().map_err(poisoned)?;
        let current = record.as_mut().ok_or_else(|| not_found(id))?;
        let data = validation::validate_patch(patch, current)?;
        if data.isbn != current.isbn {
            if isbns.get(&current.isbn) == Some(&id) {
                isbns.remove(&current.isbn);
            }
            isbns.insert(data.isbn.clone(), id);
        }

        current.apply(data, Utc::now());
        tracing::debug!(book_id = %id, "Book updated");
        Ok(current.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let slot = self.slot(id)?;
        let removed = slot
            .write()
            .map_err(poisoned)?
            .take()
            .ok_or_else(|| not_found(id))?;

        if let Ok(mut isbns) = self.isbns.try_lock() {
            if isbns.get(&removed.isbn) == Some(&id) {
                isbns.remove(&removed.isbn);
            }
        }
        self.books.write().map_err(poisoned)?.shift_remove(&id);

        tracing::debug!(book_id = %id, isbn = %removed.isbn, "Book deleted");
        Ok(())
    }

    async fn decrement_availability(&self, id: Uuid) -> AppResult<Book> {
        let slot = self.slot(id)?;
        let mut record = slot.write().map_err(poisoned)?;
        let book = record.as_mut().ok_or_else(|| not_found(id))?;

        if book.available_copies <= 0 {
            tracing::info!(book_id = %id, "No copies available to borrow");
            return Err(AppError::NoCopiesAvailable {
                id,
                current_copies: book.available_copies,
            });
        }

        book.available_copies -= 1;
        book.updated_at = Utc::now();
        tracing::debug!(book_id = %id, available = book.available_copies, "Copy borrowed");
        Ok(book.clone())
    }

    async fn count(&self) -> AppResult<u64> {
        let books = self.books.read().map_err(poisoned)?;
        let mut live = 0;
        for slot in books.values() {
            if slot.read().map_err(poisoned)?.is_some() {
                live += 1;
            }
        }
        Ok(live)
    }

    async fn ping(&self) -> AppResult<()> {
        let _books = self.books.read().map_err(poisoned)?;
        Ok(())
    }
}
