use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{ModerateReviewRequest, ReviewList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    routes::params::StatusListQuery,
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews))
        .route("/{id}", patch(moderate_review))
}

#[utoipa::path(
    get,
    path = "/api/reviews",
    params(StatusListQuery),
    responses(
        (status = 200, description = "Reviews awaiting or past moderation", body = ApiResponse<ReviewList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StatusListQuery>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_reviews(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    request_body = ModerateReviewRequest,
    responses(
        (status = 200, description = "Review moderated", body = ApiResponse<Review>),
        (status = 400, description = "Status must be approved or rejected"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn moderate_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModerateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::moderate_review(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
