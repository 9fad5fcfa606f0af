//! Book (catalog entry) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Book model from database.
///
/// `copies` counts the copies currently on the shelf, not the number ever
/// owned: it goes down on every borrow and back up on every return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    pub copies: i32,
    pub description: Option<String>,
}

fn default_copies() -> i32 {
    1
}

/// Create or replace book request
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author must not be empty"))]
    pub author: String,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    /// Available copies (defaults to 1)
    #[serde(default = "default_copies")]
    #[validate(range(min = 0, message = "Copies must be non-negative"))]
    pub copies: i32,
    pub description: Option<String>,
}
