use super::common::{map_service_error, success_response, DateRangeParams};
use crate::{errors::ApiError, handlers::AppState};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};

/// Purchase, sale, and expense totals plus profit over a date range
#[utoipa::path(
    get,
    path = "/api/v1/reports/summary",
    params(DateRangeParams),
    responses(
        (status = 200, description = "Summary computed", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid date range", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn summary_report(
    State(state): State<AppState>,
    Query(params): Query<DateRangeParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    params.validate_range()?;
    let start = params.start_bound();
    let end = params.end_bound()?;

    let report = state
        .services
        .reports
        .summary(start, end)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(report))
}

/// Report endpoints, nested under `/reports`
pub fn report_routes() -> Router<AppState> {
    Router::new().route("/summary", get(summary_report))
}
