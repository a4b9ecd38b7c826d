//! Error types for Bookshelf server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Stable error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    DbFailure = 3,
    NoSuchItem = 5,
    ItemNotAvailable = 7,
    Duplicate = 8,
    BadValue = 18,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Field '{0}' is required")]
    FieldRequired(&'static str),

    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Invalid publication year: {0}")]
    InvalidYear(String),

    #[error("Invalid available copies: {0}")]
    InvalidCopies(String),

    #[error("Duplicate value for field '{0}'")]
    DuplicateField(&'static str),

    #[error("Book {0} not found")]
    NotFound(String),

    #[error("No copies of book {id} available to borrow")]
    NoCopiesAvailable { id: Uuid, current_copies: i32 },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Name of the offending field, for validation and uniqueness failures
    pub fn field(&self) -> Option<&'static str> {
        match self {
            AppError::FieldRequired(field) | AppError::DuplicateField(field) => Some(*field),
            AppError::InvalidCategory(_) => Some("category"),
            AppError::InvalidYear(_) => Some("publicationYear"),
            AppError::InvalidCopies(_) => Some("availableCopies"),
            _ => None,
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        // isbn carries the only unique index besides the primary key
        if let sqlx::Error::Database(ref db) = e {
            if db.is_unique_violation() {
                return AppError::DuplicateField("isbn");
            }
        }
        AppError::StorageUnavailable(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::StorageUnavailable(e.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_copies: Option<i32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::FieldRequired(_)
            | AppError::InvalidCategory(_)
            | AppError::InvalidYear(_)
            | AppError::InvalidCopies(_)
            | AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::DuplicateField(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchItem),
            AppError::NoCopiesAvailable { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::ItemNotAvailable)
            }
            AppError::StorageUnavailable(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::DbFailure)
            }
        };

        let message = match &self {
            AppError::StorageUnavailable(_) => "Storage unavailable, retry later".to_string(),
            other => other.to_string(),
        };

        let current_copies = match &self {
            AppError::NoCopiesAvailable { current_copies, .. } => Some(*current_copies),
            _ => None,
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            field: self.field().map(String::from),
            current_copies,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
