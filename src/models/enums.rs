//! Shared domain enums

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Catalog category of a book. Serialized with its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
    Fiction,
    #[serde(rename = "Non-Fiction")]
    NonFiction,
    Science,
    Technology,
    History,
    Biography,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Fiction,
        Category::NonFiction,
        Category::Science,
        Category::Technology,
        Category::History,
        Category::Biography,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fiction => "Fiction",
            Category::NonFiction => "Non-Fiction",
            Category::Science => "Science",
            Category::Technology => "Technology",
            Category::History => "History",
            Category::Biography => "Biography",
            Category::Other => "Other",
        }
    }
}

/// Parsing is exact: labels are case-sensitive and untrimmed.
impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
