use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures::{Stream, StreamExt};

use crate::{
    ai::{chat::ChatRequest, relay},
    dto::search::{IndexReport, IndexRequest, IndexStatus},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::search_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/embeddings/index", get(index_status).post(index_embeddings))
}

#[utoipa::path(
    post,
    path = "/api/ai/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Event stream: visual, text, error, done", content_type = "text/event-stream"),
        (status = 400, description = "Empty message or invalid session id"),
        (status = 503, description = "AI provider is not configured"),
    ),
    tag = "AI"
)]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let events = relay::open_stream(&state, request).await?;
    let stream = events.map(|event| Ok::<_, Infallible>(event.into_sse()));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    post,
    path = "/api/ai/embeddings/index",
    request_body(content = IndexRequest, description = "Optional; `force` re-embeds every product"),
    responses(
        (status = 200, description = "Indexing finished", body = ApiResponse<IndexReport>),
        (status = 403, description = "Admins only"),
        (status = 503, description = "AI provider is not configured"),
    ),
    security(("bearer_auth" = [])),
    tag = "AI"
)]
pub async fn index_embeddings(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<IndexRequest>>,
) -> AppResult<Json<ApiResponse<IndexReport>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = search_service::index_embeddings(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/ai/embeddings/index",
    responses(
        (status = 200, description = "Embedding coverage", body = ApiResponse<IndexStatus>),
        (status = 403, description = "Admins only"),
    ),
    security(("bearer_auth" = [])),
    tag = "AI"
)]
pub async fn index_status(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<IndexStatus>>> {
    let resp = search_service::index_status(&state, &user).await?;
    Ok(Json(resp))
}
