//! PostgreSQL book store.
//!
//! ISBN uniqueness rests on the `books_isbn_key` unique index. Updates lock
//! the row with `FOR UPDATE` for the validate-and-write step; the borrow
//! decrement is a single statement that locks the row, decrements it when a
//! copy is left, and reports the count it saw.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, Pool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::BookStore;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookCandidate, BookFilter, BookRow, NewBook},
    services::validation,
};

const COLUMNS: &str = "id, title, author, isbn, category, publication_year, \
                       available_copies, created_at, updated_at";

#[derive(Clone)]
pub struct PgBookStore {
    pool: Pool<Postgres>,
}

impl PgBookStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn create(&self, data: NewBook) -> AppResult<Book> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            INSERT INTO books (id, title, author, isbn, category, publication_year,
                               available_copies, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.isbn)
        .bind(data.category.as_str())
        .bind(data.publication_year)
        .bind(data.available_copies)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = AppError::from(e);
            if matches!(err, AppError::DuplicateField(_)) {
                tracing::info!(isbn = %data.isbn, "Rejected duplicate ISBN");
            }
            err
        })?;

        let book = Book::try_from(row)?;
        tracing::debug!(book_id = %book.id, isbn = %book.isbn, "Book created");
        Ok(book)
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, BookRow>(&format!("SELECT {COLUMNS} FROM books WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_string()))?
            .try_into()
    }

    async fn list(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM books WHERE TRUE"));

        if let Some(term) = filter.title_term() {
            builder
                .push(" AND strpos(lower(title), lower(")
                .push_bind(term.to_string())
                .push(")) > 0");
        }
        if let Some(term) = filter.author_term() {
            builder
                .push(" AND strpos(lower(author), lower(")
                .push_bind(term.to_string())
                .push(")) > 0");
        }
        if let Some(category) = filter.category_term() {
            builder.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(min) = filter.min_year {
            builder.push(" AND publication_year >= ").push_bind(min);
        }
        if let Some(max) = filter.max_year {
            builder.push(" AND publication_year <= ").push_bind(max);
        }
        builder.push(" ORDER BY seq");

        let rows = builder
            .build_query_as::<BookRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Book::try_from).collect()
    }

    async fn update(&self, id: Uuid, patch: &BookCandidate) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let current: Book = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {COLUMNS} FROM books WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(id.to_string()))?
        .try_into()?;

        // Dropping `tx` on any early return rolls back and releases the row lock
        let data = validation::validate_patch(patch, &current)?;

        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            UPDATE books
            SET title = $2, author = $3, isbn = $4, category = $5,
                publication_year = $6, available_copies = $7, updated_at = $8
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.isbn)
        .bind(data.category.as_str())
        .bind(data.publication_year)
        .bind(data.available_copies)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(book_id = %id, "Book updated");
        Book::try_from(row)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id.to_string()));
        }
        tracing::debug!(book_id = %id, "Book deleted");
        Ok(())
    }

    async fn decrement_availability(&self, id: Uuid) -> AppResult<Book> {
        // `copies_before` and the refusal come from the same locked row version
        let row = sqlx::query(
            r#"
            WITH target AS (
                SELECT id, available_copies FROM books WHERE id = $1 FOR UPDATE
            ),
            updated AS (
                UPDATE books
                SET available_copies = books.available_copies - 1, updated_at = $2
                FROM target
                WHERE books.id = target.id AND books.available_copies > 0
                RETURNING books.id, books.title, books.author, books.isbn, books.category,
                          books.publication_year, books.available_copies,
                          books.created_at, books.updated_at
            )
            SELECT target.available_copies AS copies_before, updated.*
            FROM target LEFT JOIN updated ON updated.id = target.id
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(id.to_string()))?;

        if row.try_get::<Option<Uuid>, _>("id")?.is_none() {
            let current_copies: i32 = row.try_get("copies_before")?;
            tracing::info!(book_id = %id, "No copies available to borrow");
            return Err(AppError::NoCopiesAvailable { id, current_copies });
        }

        let book = Book::try_from(BookRow::from_row(&row)?)?;
        tracing::debug!(book_id = %id, available = book.available_copies, "Copy borrowed");
        Ok(book)
    }

    async fn count(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
