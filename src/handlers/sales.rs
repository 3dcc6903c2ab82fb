use super::common::{
    created_response, map_service_error, message_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::sales::{NewLineItem, NewSale},
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Request DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSaleRequest {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    /// Defaults to the current time when omitted
    pub sale_date: Option<DateTime<Utc>>,
}

/// Line item payload for create and update. Quantity and unit price are
/// checked by the service once the sale and product ids resolve.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaleLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String, example = "5.00")]
    pub unit_price: Decimal,
}

// Handler functions

/// Create a sale header with an empty total
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let sale = state
        .services
        .sales
        .create_sale(NewSale {
            customer_name: payload.customer_name,
            sale_date: payload.sale_date,
        })
        .await
        .map_err(map_service_error)?;

    info!("Sale created: {}", sale.id);

    Ok(created_response(sale))
}

/// List sale headers
#[utoipa::path(
    get,
    path = "/api/v1/sales",
    params(PaginationParams),
    responses(
        (status = 200, description = "Sales listed", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (sales, total) = state
        .services
        .sales
        .list_sales(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        sales,
        params.page,
        params.per_page,
        total,
    )))
}

/// Fetch a sale with its line items
#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}",
    params(("id" = Uuid, Path, description = "Sale id")),
    responses(
        (status = 200, description = "Sale found", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let sale = state
        .services
        .sales
        .get_sale(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(sale))
}

/// Delete a sale header without lines
#[utoipa::path(
    delete,
    path = "/api/v1/sales/{id}",
    params(("id" = Uuid, Path, description = "Sale id")),
    responses(
        (status = 200, description = "Sale deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Sale still has line items", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn delete_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .sales
        .delete_sale(id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Sale deleted"))
}

/// Add a line item to a sale
#[utoipa::path(
    post,
    path = "/api/v1/sales/{id}/lines",
    params(("id" = Uuid, Path, description = "Sale id")),
    request_body = SaleLineRequest,
    responses(
        (status = 201, description = "Line added and sale total incremented", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid quantity or unit price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Sale or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn create_sale_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaleLineRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let line = state
        .services
        .sales
        .add_line_item(
            id,
            NewLineItem {
                product_id: payload.product_id,
                quantity: payload.quantity,
                unit_price: payload.unit_price,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(line))
}

/// List the line items of a sale
#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}/lines",
    params(("id" = Uuid, Path, description = "Sale id")),
    responses(
        (status = 200, description = "Lines listed", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn list_sale_lines(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let lines = state
        .services
        .sales
        .list_line_items(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(lines))
}

/// Replace a sale line, adjusting the sale total by the delta
#[utoipa::path(
    put,
    path = "/api/v1/sales/lines/{line_id}",
    params(("line_id" = Uuid, Path, description = "Sale line id")),
    request_body = SaleLineRequest,
    responses(
        (status = 200, description = "Line updated and sale total adjusted", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid quantity or unit price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn update_sale_line(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
    Json(payload): Json<SaleLineRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let line = state
        .services
        .sales
        .update_line_item(
            line_id,
            NewLineItem {
                product_id: payload.product_id,
                quantity: payload.quantity,
                unit_price: payload.unit_price,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(line))
}

/// Remove a sale line, decrementing the sale total by its subtotal
#[utoipa::path(
    delete,
    path = "/api/v1/sales/lines/{line_id}",
    params(("line_id" = Uuid, Path, description = "Sale line id")),
    responses(
        (status = 200, description = "Line removed and sale total decremented", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn delete_sale_line(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .sales
        .remove_line_item(line_id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Sale line deleted"))
}

/// Sale endpoints, nested under `/sales`
pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale).delete(delete_sale))
        .route("/:id/lines", post(create_sale_line).get(list_sale_lines))
        .route(
            "/lines/:line_id",
            put(update_sale_line).delete(delete_sale_line),
        )
}
