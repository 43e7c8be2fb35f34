use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::analytics::AnalyticsSummary,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::AnalyticsQuery,
    services::analytics_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/summary", get(summary))
}

#[utoipa::path(
    get,
    path = "/api/analytics/summary",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Sales summary for the last N days", body = ApiResponse<AnalyticsSummary>),
        (status = 403, description = "Dashboard users only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<AnalyticsSummary>>> {
    let resp = analytics_service::summary(&state, &user, query).await?;
    Ok(Json(resp))
}
