//! Borrow and return endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{BorrowRequest, Loan, LoanQuery, ReturnRequest, ReturnTarget},
    AppState,
};

use super::AuthenticatedUser;

/// Borrow a book for a reader
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book borrowed", body = Loan),
        (status = 400, description = "No copies available or borrow limit reached"),
        (status = 404, description = "Book or reader not found"),
        (status = 409, description = "Reader already has this book")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<Json<Loan>> {
    tracing::debug!(user_id = claims.user_id, book_id = request.book_id, reader_id = request.reader_id, "Borrow requested");

    let loan = state
        .services
        .lending
        .borrow(request.book_id, request.reader_id)
        .await?;
    Ok(Json(loan))
}

/// Return a borrowed book, by loan ID or by book and reader
#[utoipa::path(
    post,
    path = "/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = Loan),
        (status = 400, description = "Neither borrow_id nor book_id and reader_id given"),
        (status = 404, description = "Borrow record not found or already returned")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReturnRequest>,
) -> AppResult<Json<Loan>> {
    let target = ReturnTarget::try_from(request)?;
    tracing::debug!(user_id = claims.user_id, ?target, "Return requested");

    let loan = state.services.lending.return_book(target).await?;
    Ok(Json(loan))
}

/// Get the loans of a reader
#[utoipa::path(
    get,
    path = "/borrow/{reader_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("reader_id" = i32, Path, description = "Reader ID"),
        LoanQuery
    ),
    responses(
        (status = 200, description = "Reader's loans", body = Vec<Loan>),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn get_reader_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(reader_id): Path<i32>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = if query.history.unwrap_or(false) {
        state.services.lending.loan_history(reader_id).await?
    } else {
        state.services.lending.active_loans(reader_id).await?
    };
    Ok(Json(loans))
}
