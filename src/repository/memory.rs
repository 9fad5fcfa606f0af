//! In-memory implementation of every store.
//!
//! A transaction takes the store mutex for its whole lifetime and works on a
//! copy of the state that replaces the shared one only on commit, so
//! transactions are fully serialized and an abandoned one leaves no trace.
//! The same uniqueness and reference rules as the SQL schema are enforced.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook},
        loan::Loan,
        reader::{CreateReader, Reader},
        user::User,
    },
};

use super::{
    CatalogStore, LendingStore, LendingTx, ReaderRegistry, UserStore, COPIES_OUT_OF_RANGE,
    LOAN_NOT_FOUND,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    book: i32,
    reader: i32,
    loan: i32,
    user: i32,
}

fn next(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<i32, Book>,
    readers: BTreeMap<i32, Reader>,
    loans: BTreeMap<i32, Loan>,
    users: BTreeMap<i32, User>,
    seq: Sequences,
}

impl MemoryState {
    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    fn reader(&self, id: i32) -> AppResult<&Reader> {
        self.readers
            .get(&id)
            .ok_or_else(|| AppError::NotFound("Reader not found".to_string()))
    }

    fn check_isbn(&self, isbn: Option<&str>, except: Option<i32>) -> AppResult<()> {
        let Some(isbn) = isbn else {
            return Ok(());
        };
        let taken = self
            .books
            .values()
            .any(|b| b.isbn.as_deref() == Some(isbn) && Some(b.id) != except);
        if taken {
            return Err(AppError::Conflict("ISBN already exists".to_string()));
        }
        Ok(())
    }

    fn check_reader_email(&self, email: &str, except: Option<i32>) -> AppResult<()> {
        if self
            .readers
            .values()
            .any(|r| r.email == email && Some(r.id) != except)
        {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        Ok(())
    }

    fn active_loan(&self, book_id: i32, reader_id: i32) -> Option<&Loan> {
        self.loans
            .values()
            .find(|l| l.book_id == book_id && l.reader_id == reader_id && l.is_active())
    }

    fn book_from(id: i32, input: &CreateBook) -> Book {
        Book {
            id,
            title: input.title.clone(),
            author: input.author.clone(),
            publication_year: input.publication_year,
            isbn: input.isbn.clone(),
            copies: input.copies,
            description: input.description.clone(),
        }
    }
}

/// Store keeping all records in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get(&self, id: i32) -> AppResult<Book> {
        self.state.lock().await.book(id).cloned()
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        Ok(self.state.lock().await.books.values().cloned().collect())
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        state.check_isbn(book.isbn.as_deref(), None)?;
        let id = next(&mut state.seq.book);
        let created = MemoryState::book_from(id, book);
        state.books.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        state.book(id)?;
        state.check_isbn(book.isbn.as_deref(), Some(id))?;
        let updated = MemoryState::book_from(id, book);
        state.books.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.book(id)?;
        if state.loans.values().any(|l| l.book_id == id) {
            return Err(AppError::Conflict("Book has loan records".to_string()));
        }
        state.books.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ReaderRegistry for MemoryStore {
    async fn get(&self, id: i32) -> AppResult<Reader> {
        self.state.lock().await.reader(id).cloned()
    }

    async fn list(&self) -> AppResult<Vec<Reader>> {
        Ok(self.state.lock().await.readers.values().cloned().collect())
    }

    async fn create(&self, reader: &CreateReader) -> AppResult<Reader> {
        let mut state = self.state.lock().await;
        state.check_reader_email(&reader.email, None)?;
        let id = next(&mut state.seq.reader);
        let created = Reader {
            id,
            name: reader.name.clone(),
            email: reader.email.clone(),
        };
        state.readers.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, reader: &CreateReader) -> AppResult<Reader> {
        let mut state = self.state.lock().await;
        state.reader(id)?;
        state.check_reader_email(&reader.email, Some(id))?;
        let updated = Reader {
            id,
            name: reader.name.clone(),
            email: reader.email.clone(),
        };
        state.readers.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.reader(id)?;
        if state.loans.values().any(|l| l.reader_id == id) {
            return Err(AppError::Conflict("Reader has loan records".to_string()));
        }
        state.readers.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, email: &str, hashed_password: &str) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        let id = next(&mut state.seq.user);
        let user = User {
            id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl LendingStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryLendingTx { guard, working }))
    }

    async fn list_for_reader(
        &self,
        reader_id: i32,
        include_returned: bool,
    ) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.reader_id == reader_id && (include_returned || l.is_active()))
            .cloned()
            .collect();
        loans.sort_by_key(|l| (l.borrow_date, l.id));
        Ok(loans)
    }
}

/// Transaction over [`MemoryStore`]
pub struct MemoryLendingTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LendingTx for MemoryLendingTx {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn lock_reader(&mut self, reader_id: i32) -> AppResult<Option<Reader>> {
        Ok(self.working.readers.get(&reader_id).cloned())
    }

    async fn take_copy(&mut self, book_id: i32) -> AppResult<Book> {
        match self.working.books.get_mut(&book_id) {
            Some(book) if book.copies > 0 => {
                book.copies -= 1;
                Ok(book.clone())
            }
            _ => Err(AppError::InvalidOperation(
                "No copies available".to_string(),
            )),
        }
    }

    async fn restore_copy(&mut self, book_id: i32) -> AppResult<bool> {
        match self.working.books.get_mut(&book_id) {
            Some(book) => {
                book.copies = book.copies.checked_add(1).ok_or_else(|| {
                    AppError::InvalidOperation(COPIES_OUT_OF_RANGE.to_string())
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_active(&mut self, reader_id: i32) -> AppResult<i64> {
        let count = self
            .working
            .loans
            .values()
            .filter(|l| l.reader_id == reader_id && l.is_active())
            .count();
        Ok(count as i64)
    }

    async fn find_active_by_book_and_reader(
        &mut self,
        book_id: i32,
        reader_id: i32,
    ) -> AppResult<Option<Loan>> {
        Ok(self.working.active_loan(book_id, reader_id).cloned())
    }

    async fn find_by_id(&mut self, loan_id: i32) -> AppResult<Loan> {
        self.working
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(LOAN_NOT_FOUND.to_string()))
    }

    async fn append(
        &mut self,
        book_id: i32,
        reader_id: i32,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        // Foreign keys
        self.working.book(book_id)?;
        self.working.reader(reader_id)?;
        if self.working.active_loan(book_id, reader_id).is_some() {
            return Err(AppError::Conflict(
                "Reader already has an active loan for this book".to_string(),
            ));
        }

        let id = next(&mut self.working.seq.loan);
        let loan = Loan {
            id,
            book_id,
            reader_id,
            borrow_date: borrowed_at,
            return_date: None,
        };
        self.working.loans.insert(id, loan.clone());
        Ok(loan)
    }

    async fn mark_returned(
        &mut self,
        loan_id: i32,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        match self.working.loans.get_mut(&loan_id) {
            Some(loan) if loan.is_active() => {
                loan.return_date = Some(returned_at);
                Ok(loan.clone())
            }
            _ => Err(AppError::NotFound(LOAN_NOT_FOUND.to_string())),
        }
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLendingTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
