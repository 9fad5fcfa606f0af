//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{error::ErrorKind, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::User,
};

use super::UserStore;

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, email: &str, hashed_password: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING *",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_constraint(e, ErrorKind::UniqueViolation, "Email already registered"))
    }
}
