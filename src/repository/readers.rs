//! Readers repository for database operations

use async_trait::async_trait;
use sqlx::{error::ErrorKind, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::reader::{CreateReader, Reader},
};

use super::ReaderRegistry;

#[derive(Clone)]
pub struct ReadersRepository {
    pool: Pool<Postgres>,
}

impl ReadersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReaderRegistry for ReadersRepository {
    async fn get(&self, id: i32) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>("SELECT * FROM readers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Reader not found".to_string()))
    }

    async fn list(&self) -> AppResult<Vec<Reader>> {
        let readers = sqlx::query_as::<_, Reader>("SELECT * FROM readers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(readers)
    }

    async fn create(&self, reader: &CreateReader) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>(
            "INSERT INTO readers (name, email) VALUES ($1, $2) RETURNING *",
        )
        .bind(&reader.name)
        .bind(&reader.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_constraint(e, ErrorKind::UniqueViolation, "Email already registered"))
    }

    async fn update(&self, id: i32, reader: &CreateReader) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>(
            "UPDATE readers SET name = $2, email = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&reader.name)
        .bind(&reader.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::on_constraint(e, ErrorKind::UniqueViolation, "Email already registered"))?
        .ok_or_else(|| AppError::NotFound("Reader not found".to_string()))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM readers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::on_constraint(e, ErrorKind::ForeignKeyViolation, "Reader has loan records"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Reader not found".to_string()));
        }
        Ok(())
    }
}
