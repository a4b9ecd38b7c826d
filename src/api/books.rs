//! Book (catalog) endpoints

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ErrorResponse},
    models::book::{Book, BookCandidate, BookFilter},
    AppState,
};

/// Path ids that are not UUIDs cannot name a record; answer `NotFound`
/// without touching the store.
fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(raw.to_string()))
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// List books matching the given filters
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookFilter),
    responses(
        (status = 200, description = "Matching books in creation order", body = Vec<Book>),
        (status = 400, description = "Malformed query", body = ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    query: Result<Query<BookFilter>, QueryRejection>,
) -> AppResult<Json<Vec<Book>>> {
    let Query(filter) = query?;
    let books = state.services.catalog.list_books(&filter).await?;
    Ok(Json(books))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book ID (UUID)")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    let id = parse_id(&id)?;
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = BookCandidate,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 409, description = "ISBN already in use", body = ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<BookCandidate>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let Json(candidate) = payload?;
    let created = state.services.catalog.create_book(&candidate).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing book. Absent fields keep their stored value.
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book ID (UUID)")),
    request_body = BookCandidate,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
        (status = 409, description = "ISBN already in use", body = ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<BookCandidate>, JsonRejection>,
) -> AppResult<Json<Book>> {
    let id = parse_id(&id)?;
    let Json(patch) = payload?;
    let updated = state.services.catalog.update_book(id, &patch).await?;
    Ok(Json(updated))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book ID (UUID)")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Borrow one copy of a book
#[utoipa::path(
    patch,
    path = "/books/{id}/decrement",
    tag = "books",
    params(("id" = String, Path, description = "Book ID (UUID)")),
    responses(
        (status = 200, description = "Copy borrowed", body = Book),
        (status = 400, description = "No copies available", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn decrement_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    let id = parse_id(&id)?;
    let book = state.services.catalog.decrement_availability(id).await?;
    Ok(Json(book))
}
