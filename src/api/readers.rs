//! Reader management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::reader::{CreateReader, Reader},
    AppState,
};

use super::AuthenticatedUser;

/// List all readers
#[utoipa::path(
    get,
    path = "/readers",
    tag = "readers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of readers", body = Vec<Reader>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_readers(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Reader>>> {
    let readers = state.services.readers.list_readers().await?;
    Ok(Json(readers))
}

/// Get reader by ID
#[utoipa::path(
    get,
    path = "/readers/{id}",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reader ID")
    ),
    responses(
        (status = 200, description = "Reader details", body = Reader),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn get_reader(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reader>> {
    let reader = state.services.readers.get_reader(id).await?;
    Ok(Json(reader))
}

/// Register a new reader
#[utoipa::path(
    post,
    path = "/readers",
    tag = "readers",
    security(("bearer_auth" = [])),
    request_body = CreateReader,
    responses(
        (status = 201, description = "Reader created", body = Reader),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_reader(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(reader): Json<CreateReader>,
) -> AppResult<(StatusCode, Json<Reader>)> {
    let created = state.services.readers.create_reader(reader).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace an existing reader
#[utoipa::path(
    put,
    path = "/readers/{id}",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reader ID")
    ),
    request_body = CreateReader,
    responses(
        (status = 200, description = "Reader updated", body = Reader),
        (status = 404, description = "Reader not found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_reader(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(reader): Json<CreateReader>,
) -> AppResult<Json<Reader>> {
    let updated = state.services.readers.update_reader(id, reader).await?;
    Ok(Json(updated))
}

/// Delete a reader without loan records
#[utoipa::path(
    delete,
    path = "/readers/{id}",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reader ID")
    ),
    responses(
        (status = 204, description = "Reader deleted"),
        (status = 404, description = "Reader not found"),
        (status = 409, description = "Reader has loan records")
    )
)]
pub async fn delete_reader(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.readers.delete_reader(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
