//! Borrow transaction endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::transaction::{BorrowRequest, TransactionDetails, TransactionQuery},
};

use super::AuthenticatedUser;

/// Transaction list response with pagination
#[derive(Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionDetails>,
    /// Total number of matching transactions
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

/// Response carrying a single transaction and a status message
#[derive(Serialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,
    pub transaction: TransactionDetails,
}

/// Return response; the fine is surfaced alongside the record
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub message: String,
    pub fine_amount: i64,
    pub transaction: TransactionDetails,
}

/// Return request body (optional; the server clock is used when absent)
#[derive(Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Moment the book came back (RFC 3339)
    pub return_timestamp: Option<DateTime<Utc>>,
}

/// Extension request body
#[derive(Deserialize, ToSchema)]
pub struct ExtendRequest {
    /// Extension duration in days: 1, 3 or 7 (default 7)
    pub days: Option<i64>,
}

/// Due date update request body
#[derive(Deserialize, ToSchema)]
pub struct UpdateDueDateRequest {
    /// New due date (YYYY-MM-DD)
    pub due_date: Option<String>,
}

/// Bulk clear response
#[derive(Serialize, ToSchema)]
pub struct ClearActivitiesResponse {
    pub message: String,
    pub deleted_count: u64,
}

/// List transactions with filters and pagination.
/// Students only see their own transactions.
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("user_id" = Option<i32>, Query, description = "Filter by user"),
        ("book_id" = Option<i32>, Query, description = "Filter by book"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 10)")
    ),
    responses(
        (status = 200, description = "List of transactions", body = TransactionListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_transactions(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let (transactions, total) = state.services.circulation.list(&claims, &query).await?;

    Ok(Json(TransactionListResponse {
        transactions,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(10),
    }))
}

/// Get a transaction by ID (owner or admin)
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Transaction details", body = TransactionDetails),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionDetails>> {
    let transaction = state.services.circulation.get(&claims, id).await?;
    Ok(Json(transaction))
}

/// Create a borrow request (always pending until approved)
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Borrow request created", body = TransactionResponse),
        (status = 400, description = "Invalid request or duplicate active borrow"),
        (status = 404, description = "Book or user not found")
    )
)]
pub async fn create_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<TransactionResponse>)> {
    let transaction = state.services.circulation.create(&claims, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            message: "Borrow request submitted, awaiting approval".to_string(),
            transaction,
        }),
    ))
}

/// Approve a pending borrow request
#[utoipa::path(
    put,
    path = "/transactions/{id}/approve",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Request approved", body = TransactionResponse),
        (status = 400, description = "Not pending, duplicate borrow, no copies or quota reached"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn approve_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionResponse>> {
    claims.require_admin()?;

    let transaction = state.services.circulation.approve(id).await?;

    Ok(Json(TransactionResponse {
        message: "Borrow request approved".to_string(),
        transaction,
    }))
}

/// Reject a pending borrow request
#[utoipa::path(
    put,
    path = "/transactions/{id}/reject",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Request rejected", body = TransactionResponse),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn reject_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionResponse>> {
    claims.require_admin()?;

    let transaction = state.services.circulation.reject(id).await?;

    Ok(Json(TransactionResponse {
        message: "Borrow request rejected".to_string(),
        transaction,
    }))
}

/// Return a borrowed book (admin or the borrower)
#[utoipa::path(
    put,
    path = "/transactions/{id}/return",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Already returned or not borrowed"),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn return_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<ReturnRequest>>,
) -> AppResult<Json<ReturnResponse>> {
    let return_timestamp = request.and_then(|Json(r)| r.return_timestamp);

    let transaction = state
        .services
        .circulation
        .return_book(&claims, id, return_timestamp)
        .await?;

    let fine_amount = transaction.fine_amount;
    let message = if fine_amount > 0 {
        format!("Book returned successfully. Fine: {}", fine_amount)
    } else {
        "Book returned successfully".to_string()
    };

    Ok(Json(ReturnResponse {
        message,
        fine_amount,
        transaction,
    }))
}

/// Extend a due date by a fixed number of days
#[utoipa::path(
    put,
    path = "/transactions/{id}/extend",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    request_body = ExtendRequest,
    responses(
        (status = 200, description = "Due date extended", body = TransactionResponse),
        (status = 400, description = "Invalid duration or transaction not active"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn extend_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<ExtendRequest>>,
) -> AppResult<Json<TransactionResponse>> {
    claims.require_admin()?;

    let days = request.and_then(|Json(r)| r.days);
    let transaction = state.services.circulation.extend(id, days).await?;

    Ok(Json(TransactionResponse {
        message: "Due date extended".to_string(),
        transaction,
    }))
}

/// Set a transaction's due date and recompute fine and status
#[utoipa::path(
    put,
    path = "/transactions/{id}/update-due-date",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    request_body = UpdateDueDateRequest,
    responses(
        (status = 200, description = "Due date updated", body = TransactionResponse),
        (status = 400, description = "Missing or invalid due date"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn update_due_date(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<UpdateDueDateRequest>>,
) -> AppResult<Json<TransactionResponse>> {
    claims.require_admin()?;

    let due_date = request.and_then(|Json(r)| r.due_date);
    let transaction = state
        .services
        .circulation
        .update_due_date(id, due_date.as_deref())
        .await?;

    Ok(Json(TransactionResponse {
        message: "Due date updated and fine recalculated".to_string(),
        transaction,
    }))
}

/// Delete a settled transaction
#[utoipa::path(
    delete,
    path = "/transactions/{id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 204, description = "Transaction deleted"),
        (status = 400, description = "Transaction still active"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn delete_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.circulation.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Clear settled activity (admins: all records, students: their own)
#[utoipa::path(
    delete,
    path = "/transactions/activities/clear",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Activities cleared", body = ClearActivitiesResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn clear_activities(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ClearActivitiesResponse>> {
    let deleted_count = state.services.circulation.clear_activities(&claims).await?;

    Ok(Json(ClearActivitiesResponse {
        message: format!("Cleared {} activities", deleted_count),
        deleted_count,
    }))
}
