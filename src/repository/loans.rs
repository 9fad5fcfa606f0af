//! Loans repository for database operations
//!
//! Concurrency relies on row locks taken inside one transaction, always
//! book row first: a borrow locks the book, then the reader, then inserts
//! the loan; a return reads the loan unlocked, locks its book, then closes
//! the loan. Loan lookups never lock. Copy counts and return dates only
//! change through conditional updates, and the partial unique index on
//! active loans rejects a second outstanding loan for the same pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{error::ErrorKind, Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{book::Book, loan::Loan, reader::Reader},
};

use super::{LendingStore, LendingTx, COPIES_OUT_OF_RANGE, LOAN_NOT_FOUND};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LendingStore for LoansRepository {
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLendingTx { tx }))
    }

    /// Get loans for a reader
    async fn list_for_reader(
        &self,
        reader_id: i32,
        include_returned: bool,
    ) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM borrowed_books
            WHERE reader_id = $1 AND ($2 OR return_date IS NULL)
            ORDER BY borrow_date, id
            "#,
        )
        .bind(reader_id)
        .bind(include_returned)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }
}

/// Borrow/return transaction on PostgreSQL.
///
/// Dropping it without commit rolls the transaction back.
pub struct PgLendingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LendingTx for PgLendingTx {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn lock_reader(&mut self, reader_id: i32) -> AppResult<Option<Reader>> {
        let reader =
            sqlx::query_as::<_, Reader>("SELECT * FROM readers WHERE id = $1 FOR UPDATE")
                .bind(reader_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(reader)
    }

    async fn take_copy(&mut self, book_id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            "UPDATE books SET copies = copies - 1 WHERE id = $1 AND copies > 0 RETURNING *",
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::InvalidOperation("No copies available".to_string()))
    }

    async fn restore_copy(&mut self, book_id: i32) -> AppResult<bool> {
        let result = sqlx::query("UPDATE books SET copies = copies + 1 WHERE id = $1")
            .bind(book_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if AppError::is_out_of_range(&e) {
                    AppError::InvalidOperation(COPIES_OUT_OF_RANGE.to_string())
                } else {
                    AppError::Database(e)
                }
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Count active loans of a reader
    async fn count_active(&mut self, reader_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrowed_books WHERE reader_id = $1 AND return_date IS NULL",
        )
        .bind(reader_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn find_active_by_book_and_reader(
        &mut self,
        book_id: i32,
        reader_id: i32,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM borrowed_books
            WHERE book_id = $1 AND reader_id = $2 AND return_date IS NULL
            "#,
        )
        .bind(book_id)
        .bind(reader_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    /// Get loan by ID
    async fn find_by_id(&mut self, loan_id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM borrowed_books WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(LOAN_NOT_FOUND.to_string()))
    }

    async fn append(
        &mut self,
        book_id: i32,
        reader_id: i32,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO borrowed_books (book_id, reader_id, borrow_date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(reader_id)
        .bind(borrowed_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::on_constraint(
                e,
                ErrorKind::UniqueViolation,
                "Reader already has an active loan for this book",
            )
        })
    }

    async fn mark_returned(
        &mut self,
        loan_id: i32,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            UPDATE borrowed_books SET return_date = $2
            WHERE id = $1 AND return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(returned_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(LOAN_NOT_FOUND.to_string()))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgLendingTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
