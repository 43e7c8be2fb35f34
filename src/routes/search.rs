use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::search::SearchResults,
    error::AppResult,
    response::ApiResponse,
    routes::params::SearchQuery,
    services::search_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(search))
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Semantic matches, or keyword matches when embeddings are unavailable", body = ApiResponse<SearchResults>),
        (status = 400, description = "Missing or oversized query"),
    ),
    tag = "Search"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchResults>>> {
    let resp = search_service::search(&state, query).await?;
    Ok(Json(resp))
}
