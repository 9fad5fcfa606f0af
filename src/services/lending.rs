//! Borrow and return of books.
//!
//! Each operation runs its checks and its writes inside a single store
//! transaction, so two requests racing on the same book or reader cannot
//! both pass a check that only one of them may pass.

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, ReturnTarget},
    repository::{Repository, LOAN_NOT_FOUND},
};

/// Maximum number of simultaneously active loans per reader
pub const MAX_ACTIVE_LOANS: i64 = 3;

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
}

impl LendingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Lend one copy of a book to a reader
    pub async fn borrow(&self, book_id: i32, reader_id: i32) -> AppResult<Loan> {
        let mut tx = self.repository.loans.begin().await?;

        let book = tx
            .lock_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
        if book.copies <= 0 {
            return Err(AppError::InvalidOperation(
                "No copies available".to_string(),
            ));
        }

        let reader = tx
            .lock_reader(reader_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reader not found".to_string()))?;

        let active = tx.count_active(reader.id).await?;
        if active >= MAX_ACTIVE_LOANS {
            return Err(AppError::InvalidOperation(format!(
                "Reader has already borrowed {} books",
                MAX_ACTIVE_LOANS
            )));
        }

        if tx
            .find_active_by_book_and_reader(book.id, reader.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Reader already has an active loan for this book".to_string(),
            ));
        }

        let book = tx.take_copy(book.id).await?;
        let loan = tx.append(book.id, reader.id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            book_id = book.id,
            reader_id = reader.id,
            copies_left = book.copies,
            "Book borrowed"
        );
        Ok(loan)
    }

    /// Close an active loan and put the copy back on the shelf.
    ///
    /// A missing loan and an already returned one yield the same `NotFound`.
    pub async fn return_book(&self, target: ReturnTarget) -> AppResult<Loan> {
        let mut tx = self.repository.loans.begin().await?;

        let loan = match target {
            ReturnTarget::Loan(loan_id) => Some(tx.find_by_id(loan_id).await?),
            ReturnTarget::BookAndReader { book_id, reader_id } => {
                tx.find_active_by_book_and_reader(book_id, reader_id).await?
            }
        };
        let loan = loan
            .filter(Loan::is_active)
            .ok_or_else(|| AppError::NotFound(LOAN_NOT_FOUND.to_string()))?;

        // Book row first, as in borrow. A concurrent return of the same loan
        // waits here and then finds it closed in `mark_returned`.
        tx.lock_book(loan.book_id).await?;
        let loan = tx.mark_returned(loan.id, Utc::now()).await?;
        let restored = tx.restore_copy(loan.book_id).await?;
        tx.commit().await?;

        if !restored {
            tracing::warn!(
                loan_id = loan.id,
                book_id = loan.book_id,
                "Returned loan references a deleted book"
            );
        }
        tracing::info!(
            loan_id = loan.id,
            book_id = loan.book_id,
            reader_id = loan.reader_id,
            "Book returned"
        );
        Ok(loan)
    }

    /// Active loans of a reader
    pub async fn active_loans(&self, reader_id: i32) -> AppResult<Vec<Loan>> {
        self.repository.readers.get(reader_id).await?;
        self.repository.loans.list_for_reader(reader_id, false).await
    }

    /// Every loan of a reader, returned ones included
    pub async fn loan_history(&self, reader_id: i32) -> AppResult<Vec<Loan>> {
        self.repository.readers.get(reader_id).await?;
        self.repository.loans.list_for_reader(reader_id, true).await
    }

    /// Open and immediately abandon a transaction
    pub async fn check_store(&self) -> AppResult<()> {
        self.repository.loans.begin().await.map(drop)
    }
}
