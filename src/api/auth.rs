//! Authentication endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::user::{Credentials, Token},
    AppState,
};

/// Register a new staff user
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "User registered", body = Token),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<Token>> {
    let token = state.services.auth.register(credentials).await?;
    Ok(Json(token))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Login successful", body = Token),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<Token>> {
    let token = state.services.auth.login(credentials).await?;
    Ok(Json(token))
}
