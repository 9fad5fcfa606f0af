//! Repository layer for database operations
//!
//! Each store is a trait so that services can run against PostgreSQL in
//! production and against the in-memory backend in tests. Borrow and return
//! go through [`LendingStore::begin`], which hands out a transaction owning
//! every read and write of the operation until it is committed or dropped.

pub mod books;
pub mod loans;
pub mod memory;
pub mod readers;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, CreateBook},
        loan::Loan,
        reader::{CreateReader, Reader},
        user::User,
    },
};

/// Message shared by every "no such active loan" outcome, so a caller cannot
/// tell a missing loan from one that was already returned.
pub const LOAN_NOT_FOUND: &str = "Borrow record not found or already returned";

pub const COPIES_OUT_OF_RANGE: &str = "Copy count out of range";

/// Book records and their available-copy counts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<Book>;

    async fn list(&self) -> AppResult<Vec<Book>>;

    /// Fails with `Conflict` when the ISBN is already taken
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;

    async fn update(&self, id: i32, book: &CreateBook) -> AppResult<Book>;

    /// Fails with `Conflict` while loan records reference the book
    async fn delete(&self, id: i32) -> AppResult<()>;
}

/// Reader records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReaderRegistry: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<Reader>;

    async fn list(&self) -> AppResult<Vec<Reader>>;

    /// Fails with `Conflict` when the email is already registered
    async fn create(&self, reader: &CreateReader) -> AppResult<Reader>;

    async fn update(&self, id: i32, reader: &CreateReader) -> AppResult<Reader>;

    async fn delete(&self, id: i32) -> AppResult<()>;
}

/// Staff accounts used by the auth layer
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `Conflict` when the email is already registered
    async fn create(&self, email: &str, hashed_password: &str) -> AppResult<User>;
}

/// Entry point of the loan ledger
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// Open a transaction. Dropping it without calling
    /// [`LendingTx::commit`] discards every change made through it.
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>>;

    /// Loans of a reader ordered by borrow date, optionally including
    /// returned ones
    async fn list_for_reader(&self, reader_id: i32, include_returned: bool)
        -> AppResult<Vec<Loan>>;
}

/// One borrow or return in flight.
///
/// Rows read through the `lock_*` methods stay locked against concurrent
/// transactions until commit or rollback. Callers lock the book row before
/// anything else; loan lookups take no lock.
#[async_trait]
pub trait LendingTx: Send {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<Book>>;

    async fn lock_reader(&mut self, reader_id: i32) -> AppResult<Option<Reader>>;

    /// Take one copy off the shelf. Fails with `InvalidOperation` if none is left.
    async fn take_copy(&mut self, book_id: i32) -> AppResult<Book>;

    /// Put one copy back. Returns `false` if the book no longer exists and
    /// fails with `InvalidOperation` if the count would overflow.
    async fn restore_copy(&mut self, book_id: i32) -> AppResult<bool>;

    async fn count_active(&mut self, reader_id: i32) -> AppResult<i64>;

    async fn find_active_by_book_and_reader(
        &mut self,
        book_id: i32,
        reader_id: i32,
    ) -> AppResult<Option<Loan>>;

    /// Fails with `NotFound` if the loan does not exist.
    async fn find_by_id(&mut self, loan_id: i32) -> AppResult<Loan>;

    /// Insert an active loan. Fails with `Conflict` if the pair already has one.
    async fn append(
        &mut self,
        book_id: i32,
        reader_id: i32,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<Loan>;

    /// Close an active loan. Fails with `NotFound` if the loan is missing or
    /// already returned.
    async fn mark_returned(&mut self, loan_id: i32, returned_at: DateTime<Utc>)
        -> AppResult<Loan>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Main repository struct holding every store
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn CatalogStore>,
    pub readers: Arc<dyn ReaderRegistry>,
    pub loans: Arc<dyn LendingStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Create a repository backed by the given PostgreSQL pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            readers: Arc::new(readers::ReadersRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::new();
        Self {
            books: Arc::new(store.clone()),
            readers: Arc::new(store.clone()),
            loans: Arc::new(store.clone()),
            users: Arc::new(store),
        }
    }
}
