//! Book record validation and normalization.
//!
//! Pure functions: nothing here touches storage. ISBN uniqueness needs a
//! collection-wide view and is enforced by the store.
//!
//! Two passes. The shape pass trims text, requires fields and checks that the
//! category and numbers have the right form. The value rules derived on
//! `NewBook` then run through `validator`, and the first failure in field
//! order is reported.

use chrono::{Datelike, Utc};
use serde_json::Value;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookCandidate, NewBook},
        enums::Category,
    },
};

/// Earliest accepted publication year
pub const MIN_PUBLICATION_YEAR: i32 = 1000;

/// Copies assumed when a create request omits `availableCopies`
pub const DEFAULT_AVAILABLE_COPIES: i32 = 1;

/// Current calendar year (UTC), the upper bound for publication years
pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Validate a full candidate for creation.
pub fn validate_new(candidate: &BookCandidate) -> AppResult<NewBook> {
    validate_new_with_year(candidate, current_year())
}

/// Validate a partial patch against the record it will be applied to.
///
/// The patch is merged over `existing` and the merged record is validated
/// as a whole, so an absent field keeps its stored value while a present
/// one must be valid on its own.
pub fn validate_patch(patch: &BookCandidate, existing: &Book) -> AppResult<NewBook> {
    validate_patch_with_year(patch, existing, current_year())
}

pub fn validate_new_with_year(candidate: &BookCandidate, max_year: i32) -> AppResult<NewBook> {
    let title = required_text(&candidate.title, "title")?;
    let author = required_text(&candidate.author, "author")?;
    let isbn = required_text(&candidate.isbn, "isbn")?;

    let category = match &candidate.category {
        Some(value) => value.parse::<Category>().map_err(AppError::InvalidCategory)?,
        None => return Err(AppError::FieldRequired("category")),
    };

    let publication_year = match &candidate.publication_year {
        Some(value) => whole_i32(value).ok_or_else(|| AppError::InvalidYear(raw(value)))?,
        None => return Err(AppError::FieldRequired("publicationYear")),
    };

    let available_copies = match &candidate.available_copies {
        Some(value) => whole_i32(value).ok_or_else(|| AppError::InvalidCopies(raw(value)))?,
        None => DEFAULT_AVAILABLE_COPIES,
    };

    let data = NewBook {
        title,
        author,
        isbn,
        category,
        publication_year,
        available_copies,
    };
    check_rules(&data, max_year)?;
    Ok(data)
}

pub fn validate_patch_with_year(
    patch: &BookCandidate,
    existing: &Book,
    max_year: i32,
) -> AppResult<NewBook> {
    validate_new_with_year(&merge(patch, existing), max_year)
}

/// Run the derived value rules and map the first failing field to its error.
fn check_rules(data: &NewBook, max_year: i32) -> AppResult<()> {
    let failed: Vec<String> = match data.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.field_errors().into_keys().map(|k| k.to_string()).collect(),
    };
    let has = |field: &str| failed.iter().any(|f| f == field);

    for field in ["title", "author", "isbn"] {
        if has(field) {
            return Err(AppError::FieldRequired(field));
        }
    }
    // the upper bound moves with the clock, so it is not a derive attribute
    if has("publication_year") || data.publication_year > max_year {
        return Err(AppError::InvalidYear(data.publication_year.to_string()));
    }
    if has("available_copies") {
        return Err(AppError::InvalidCopies(data.available_copies.to_string()));
    }
    if !failed.is_empty() {
        return Err(AppError::BadRequest(format!("Invalid fields: {}", failed.join(", "))));
    }
    Ok(())
}

fn merge(patch: &BookCandidate, existing: &Book) -> BookCandidate {
    let base = BookCandidate::from(&NewBook::from(existing));
    BookCandidate {
        title: patch.title.clone().or(base.title),
        author: patch.author.clone().or(base.author),
        isbn: patch.isbn.clone().or(base.isbn),
        category: patch.category.clone().or(base.category),
        publication_year: patch.publication_year.clone().or(base.publication_year),
        available_copies: patch.available_copies.clone().or(base.available_copies),
    }
}

/// Trimmed text; a blank value is left to the length rule.
fn required_text(value: &Option<String>, field: &'static str) -> AppResult<String> {
    value
        .as_deref()
        .map(|s| s.trim().to_string())
        .ok_or(AppError::FieldRequired(field))
}

/// Integral value of a JSON number or numeric string.
///
/// `2001`, `2001.0` and `"2001"` count; `2001.5`, `"abc"` and `true` do not.
fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn whole_i32(value: &Value) -> Option<i32> {
    integral(value).and_then(|n| i32::try_from(n).ok())
}

/// Offending value as the caller sent it, strings without quotes
fn raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
