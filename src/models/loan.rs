//! Loan (borrowed book) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;

/// One borrow-to-return lifecycle of a book by a reader.
///
/// A loan is active while `return_date` is `None`. Setting it is the only
/// mutation a loan ever sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub reader_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i32,
    pub reader_id: i32,
}

/// Return request: either `borrow_id`, or both `book_id` and `reader_id`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub borrow_id: Option<i32>,
    pub book_id: Option<i32>,
    pub reader_id: Option<i32>,
}

/// Which loan a return refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTarget {
    Loan(i32),
    BookAndReader { book_id: i32, reader_id: i32 },
}

impl TryFrom<ReturnRequest> for ReturnTarget {
    type Error = AppError;

    fn try_from(request: ReturnRequest) -> Result<Self, Self::Error> {
        match request {
            ReturnRequest {
                borrow_id: Some(id),
                ..
            } => Ok(ReturnTarget::Loan(id)),
            ReturnRequest {
                book_id: Some(book_id),
                reader_id: Some(reader_id),
                ..
            } => Ok(ReturnTarget::BookAndReader { book_id, reader_id }),
            _ => Err(AppError::InvalidOperation(
                "Invalid return request".to_string(),
            )),
        }
    }
}

/// Reader loans query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    /// Include returned loans
    pub history: Option<bool>,
}
