//! Book (catalog entry) model and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::Category;
use crate::error::AppError;

/// Full book record (storage + API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: Category,
    pub publication_year: i32,
    /// Copies currently on the shelf, never negative
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Build a fresh record from validated fields. Both timestamps are `now`.
    pub fn from_new(id: Uuid, data: NewBook, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: data.title,
            author: data.author,
            isbn: data.isbn,
            category: data.category,
            publication_year: data.publication_year,
            available_copies: data.available_copies,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every caller-editable field, keeping id and creation time.
    pub fn apply(&mut self, data: NewBook, now: DateTime<Utc>) {
        self.title = data.title;
        self.author = data.author;
        self.isbn = data.isbn;
        self.category = data.category;
        self.publication_year = data.publication_year;
        self.available_copies = data.available_copies;
        self.updated_at = now;
    }
}

/// Raw `books` row. Category is stored as its label.
#[derive(Debug, FromRow)]
pub struct BookRow {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub publication_year: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookRow> for Book {
    type Error = AppError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let category = row.category.parse::<Category>().map_err(|c| {
            AppError::StorageUnavailable(format!("Unknown category '{}' stored for book {}", c, row.id))
        })?;
        Ok(Self {
            id: row.id,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            category,
            publication_year: row.publication_year,
            available_copies: row.available_copies,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Normalized field set. Value rules are checked with `validate()`; the
/// upper bound on the year depends on the clock and is checked separately.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    pub category: Category,
    #[validate(range(min = 1000, message = "Publication year must be valid"))]
    pub publication_year: i32,
    #[validate(range(min = 0, message = "Available copies cannot be negative"))]
    pub available_copies: i32,
}

impl From<&Book> for NewBook {
    fn from(b: &Book) -> Self {
        Self {
            title: b.title.clone(),
            author: b.author.clone(),
            isbn: b.isbn.clone(),
            category: b.category,
            publication_year: b.publication_year,
            available_copies: b.available_copies,
        }
    }
}

/// Candidate fields for create (full) or update (partial).
///
/// Numeric fields are kept as raw JSON values so a fractional or textual
/// year or copy count is reported by the validator instead of failing to decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookCandidate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    /// One of Fiction, Non-Fiction, Science, Technology, History, Biography, Other
    pub category: Option<String>,
    #[schema(value_type = Option<i32>)]
    pub publication_year: Option<Value>,
    #[schema(value_type = Option<i32>)]
    pub available_copies: Option<Value>,
}

impl From<&NewBook> for BookCandidate {
    fn from(b: &NewBook) -> Self {
        Self {
            title: Some(b.title.clone()),
            author: Some(b.author.clone()),
            isbn: Some(b.isbn.clone()),
            category: Some(b.category.to_string()),
            publication_year: Some(b.publication_year.into()),
            available_copies: Some(b.available_copies.into()),
        }
    }
}

/// List filter. Every supplied predicate must hold; blank text values are ignored.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookFilter {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Exact category label
    pub category: Option<String>,
    /// Inclusive lower bound on publication year
    pub min_year: Option<i32>,
    /// Inclusive upper bound on publication year
    pub max_year: Option<i32>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl BookFilter {
    pub fn title_term(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    pub fn author_term(&self) -> Option<&str> {
        non_blank(&self.author)
    }

    pub fn category_term(&self) -> Option<&str> {
        non_blank(&self.category)
    }

    pub fn matches(&self, book: &Book) -> bool {
        if let Some(term) = self.title_term() {
            if !book.title.to_lowercase().contains(&term.to_lowercase()) {
                return false;
            }
        }
        if let Some(term) = self.author_term() {
            if !book.author.to_lowercase().contains(&term.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = self.category_term() {
            if book.category.as_str() != category {
                return false;
            }
        }
        if let Some(min) = self.min_year {
            if book.publication_year < min {
                return false;
            }
        }
        if let Some(max) = self.max_year {
            if book.publication_year > max {
                return false;
            }
        }
        true
    }
}
