//! Data models for Bookshelf

pub mod book;
pub mod enums;

// Re-export commonly used types
pub use book::{Book, BookCandidate, BookFilter, NewBook};
pub use enums::Category;
