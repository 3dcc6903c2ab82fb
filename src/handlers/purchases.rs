use super::common::{
    created_response, map_service_error, message_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::purchases::{NewLineItem, NewPurchase},
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
pub struct CreatePurchaseRequest {
    pub supplier_id: Uuid,
    /// Defaults to the current time when omitted
    pub purchase_date: Option<DateTime<Utc>>,
}

/// Line item payload for create and update. Quantity and unit price are
/// checked by the service once the purchase and product ids resolve.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurchaseLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String, example = "10.00")]
    pub unit_price: Decimal,
}

// Handler functions

/// Create a purchase header with an empty total
#[utoipa::path(
    post,
    path = "/api/v1/purchases",
    request_body = CreatePurchaseRequest,
    responses(
        (status = 201, description = "Purchase created", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchases"
)]
pub async fn create_purchase(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let purchase = state
        .services
        .purchases
        .create_purchase(NewPurchase {
            supplier_id: payload.supplier_id,
            purchase_date: payload.purchase_date,
        })
        .await
        .map_err(map_service_error)?;

    info!("Purchase created: {}", purchase.id);

    Ok(created_response(purchase))
}

/// List purchase headers
#[utoipa::path(
    get,
    path = "/api/v1/purchases",
    params(PaginationParams),
    responses(
        (status = 200, description = "Purchases listed", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "purchases"
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (purchases, total) = state
        .services
        .purchases
        .list_purchases(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        purchases,
        params.page,
        params.per_page,
        total,
    )))
}

/// Fetch a purchase with its line items
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}",
    params(("id" = Uuid, Path, description = "Purchase id")),
    responses(
        (status = 200, description = "Purchase found", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchases"
)]
pub async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let purchase = state
        .services
        .purchases
        .get_purchase(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(purchase))
}

/// Delete a purchase header without lines
#[utoipa::path(
    delete,
    path = "/api/v1/purchases/{id}",
    params(("id" = Uuid, Path, description = "Purchase id")),
    responses(
        (status = 200, description = "Purchase deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Purchase still has line items", body = crate::errors::ErrorResponse)
    ),
    tag = "purchases"
)]
pub async fn delete_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .purchases
        .delete_purchase(id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Purchase deleted"))
}

/// Add a line item to a purchase
#[utoipa::path(
    post,
    path = "/api/v1/purchases/{id}/lines",
    params(("id" = Uuid, Path, description = "Purchase id")),
    request_body = PurchaseLineRequest,
    responses(
        (status = 201, description = "Line added and purchase total incremented", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid quantity or unit price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchases"
)]
pub async fn create_purchase_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PurchaseLineRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let line = state
        .services
        .purchases
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

/// List the line items of a purchase
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}/lines",
    params(("id" = Uuid, Path, description = "Purchase id")),
    responses(
        (status = 200, description = "Lines listed", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchases"
)]
pub async fn list_purchase_lines(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let lines = state
        .services
        .purchases
        .list_line_items(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(lines))
}

/// Replace a purchase line, adjusting the purchase total by the delta
#[utoipa::path(
    put,
    path = "/api/v1/purchases/lines/{line_id}",
    params(("line_id" = Uuid, Path, description = "Purchase line id")),
    request_body = PurchaseLineRequest,
    responses(
        (status = 200, description = "Line updated and purchase total adjusted", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid quantity or unit price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchases"
)]
pub async fn update_purchase_line(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
    Json(payload): Json<PurchaseLineRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let line = state
        .services
        .purchases
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

/// Remove a purchase line, decrementing the purchase total by its subtotal
#[utoipa::path(
    delete,
    path = "/api/v1/purchases/lines/{line_id}",
    params(("line_id" = Uuid, Path, description = "Purchase line id")),
    responses(
        (status = 200, description = "Line removed and purchase total decremented", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchases"
)]
pub async fn delete_purchase_line(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .purchases
        .remove_line_item(line_id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Purchase line deleted"))
}

/// Purchase endpoints, nested under `/purchases`
pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase).get(list_purchases))
        .route("/:id", get(get_purchase).delete(delete_purchase))
        .route(
            "/:id/lines",
            post(create_purchase_line).get(list_purchase_lines),
        )
        .route(
            "/lines/:line_id",
            put(update_purchase_line).delete(delete_purchase_line),
        )
}
