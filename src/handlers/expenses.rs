use super::common::{
    created_response, map_service_error, message_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{errors::ApiError, handlers::AppState, services::expenses::NewExpense};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ExpenseRequest {
    #[validate(length(min = 1, max = 500, message = "Description is required"))]
    pub description: String,
    /// Must be positive
    #[schema(value_type = String, example = "89.99")]
    pub amount: Decimal,
    /// Defaults to the current time when omitted
    pub expense_date: Option<DateTime<Utc>>,
}

/// Record an expense
#[utoipa::path(
    post,
    path = "/api/v1/expenses",
    request_body = ExpenseRequest,
    responses(
        (status = 201, description = "Expense created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn create_expense(
    State(state): State<AppState>,
    Json(payload): Json<ExpenseRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let expense = state
        .services
        .expenses
        .create_expense(NewExpense {
            description: payload.description,
            amount: payload.amount,
            expense_date: payload.expense_date,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(expense))
}

/// List expenses
#[utoipa::path(
    get,
    path = "/api/v1/expenses",
    params(PaginationParams),
    responses(
        (status = 200, description = "Expenses listed", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "expenses"
)]
pub async fn list_expenses(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (expenses, total) = state
        .services
        .expenses
        .list_expenses(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        expenses,
        params.page,
        params.per_page,
        total,
    )))
}

/// Fetch an expense
#[utoipa::path(
    get,
    path = "/api/v1/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense id")),
    responses(
        (status = 200, description = "Expense found", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Expense not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn get_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let expense = state
        .services
        .expenses
        .get_expense(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(expense))
}

/// Replace an expense
#[utoipa::path(
    put,
    path = "/api/v1/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense id")),
    request_body = ExpenseRequest,
    responses(
        (status = 200, description = "Expense updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Expense not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExpenseRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let expense = state
        .services
        .expenses
        .update_expense(
            id,
            NewExpense {
                description: payload.description,
                amount: payload.amount,
                expense_date: payload.expense_date,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(expense))
}

/// Delete an expense
#[utoipa::path(
    delete,
    path = "/api/v1/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense id")),
    responses(
        (status = 200, description = "Expense deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Expense not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .expenses
        .delete_expense(id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Expense deleted"))
}

/// Expense endpoints, nested under `/expenses`
pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_expense).get(list_expenses))
        .route(
            "/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
}
