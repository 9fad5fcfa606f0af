//! Authentication service: staff registration, login and token issuance

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{Credentials, Token, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new user and log them in
    pub async fn register(&self, credentials: Credentials) -> AppResult<Token> {
        credentials.validate()?;

        if self
            .repository
            .users
            .find_by_email(&credentials.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let hashed = self.hash_password(&credentials.password)?;
        let user = self
            .repository
            .users
            .create(&credentials.email, &hashed)
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        self.create_token_for_user(&user)
    }

    /// Authenticate by email and password
    pub async fn login(&self, credentials: Credentials) -> AppResult<Token> {
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let user = self
            .repository
            .users
            .find_by_email(&credentials.email)
            .await?
            .ok_or_else(invalid)?;

        if !self.verify_password(&user, &credentials.password)? {
            return Err(invalid());
        }

        self.create_token_for_user(&user)
    }

    /// Validate a bearer token
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Unauthorized(e.to_string()))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<Token> {
        let now = Utc::now().timestamp();
        let exp = now + self.config.jwt_expiration_minutes * 60;

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            exp,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        Ok(Token::bearer(token))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.hashed_password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
