//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{error::ErrorKind, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook},
};

use super::CatalogStore;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for BooksRepository {
    /// Get book by ID
    async fn get(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, publication_year, isbn, copies, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(&book.isbn)
        .bind(book.copies)
        .bind(&book.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_constraint(e, ErrorKind::UniqueViolation, "ISBN already exists"))
    }

    async fn update(&self, id: i32, book: &CreateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $2, author = $3, publication_year = $4, isbn = $5,
                copies = $6, description = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(&book.isbn)
        .bind(book.copies)
        .bind(&book.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::on_constraint(e, ErrorKind::UniqueViolation, "ISBN already exists"))?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::on_constraint(e, ErrorKind::ForeignKeyViolation, "Book has loan records"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        Ok(())
    }
}
