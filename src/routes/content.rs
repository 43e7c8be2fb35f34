use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::content::{BannerList, BannerRequest, GlobalRequest, LocalizedPage, PageRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Banner, GlobalDoc, Page},
    response::ApiResponse,
    routes::params::{BannerQuery, LocaleQuery},
    services::content_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/banners", get(list_banners).post(create_banner))
        .route("/banners/all", get(list_all_banners))
        .route("/banners/{id}", put(update_banner).delete(delete_banner))
        .route("/pages/{slug}", get(get_page).put(upsert_page))
        .route("/globals/{key}", get(get_global).put(put_global))
}

#[utoipa::path(
    get,
    path = "/api/content/banners",
    params(BannerQuery),
    responses(
        (status = 200, description = "Banners live right now", body = ApiResponse<BannerList>)
    ),
    tag = "Content"
)]
pub async fn list_banners(
    State(state): State<AppState>,
    Query(query): Query<BannerQuery>,
) -> AppResult<Json<ApiResponse<BannerList>>> {
    let resp = content_service::list_live_banners(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/content/banners/all",
    responses(
        (status = 200, description = "Every banner, live or not", body = ApiResponse<BannerList>),
        (status = 403, description = "Dashboard users only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn list_all_banners(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BannerList>>> {
    let resp = content_service::list_all_banners(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/content/banners",
    request_body = BannerRequest,
    responses(
        (status = 201, description = "Banner created", body = ApiResponse<Banner>),
        (status = 400, description = "Window ends before it starts"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn create_banner(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BannerRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Banner>>)> {
    let resp = content_service::create_banner(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/content/banners/{id}",
    params(("id" = Uuid, Path, description = "Banner ID")),
    request_body = BannerRequest,
    responses(
        (status = 200, description = "Banner updated", body = ApiResponse<Banner>),
        (status = 404, description = "Banner not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn update_banner(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BannerRequest>,
) -> AppResult<Json<ApiResponse<Banner>>> {
    let resp = content_service::update_banner(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/content/banners/{id}",
    params(("id" = Uuid, Path, description = "Banner ID")),
    responses(
        (status = 200, description = "Banner deleted"),
        (status = 404, description = "Banner not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn delete_banner(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = content_service::delete_banner(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/content/pages/{slug}",
    params(("slug" = String, Path, description = "Page slug"), LocaleQuery),
    responses(
        (status = 200, description = "Published page in the requested locale", body = ApiResponse<LocalizedPage>),
        (status = 404, description = "Page not found or unpublished"),
    ),
    tag = "Content"
)]
pub async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<LocaleQuery>,
) -> AppResult<Json<ApiResponse<LocalizedPage>>> {
    let locale = query.locale.unwrap_or_default();
    let resp = content_service::get_page(&state, &slug, locale).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/content/pages/{slug}",
    params(("slug" = String, Path, description = "Page slug")),
    request_body = PageRequest,
    responses(
        (status = 200, description = "Page created or replaced", body = ApiResponse<Page>),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn upsert_page(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<PageRequest>,
) -> AppResult<Json<ApiResponse<Page>>> {
    let resp = content_service::upsert_page(&state, &user, &slug, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/content/globals/{key}",
    params(("key" = String, Path, description = "footer, navigation, homepage or timeline")),
    responses(
        (status = 200, description = "Site-wide document", body = ApiResponse<GlobalDoc>),
        (status = 404, description = "Unknown or unset key"),
    ),
    tag = "Content"
)]
pub async fn get_global(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<ApiResponse<GlobalDoc>>> {
    let resp = content_service::get_global(&state, &key).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/content/globals/{key}",
    params(("key" = String, Path, description = "footer, navigation, homepage or timeline")),
    request_body = GlobalRequest,
    responses(
        (status = 200, description = "Document stored", body = ApiResponse<GlobalDoc>),
        (status = 400, description = "Data must be an object or array"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn put_global(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key): Path<String>,
    Json(payload): Json<GlobalRequest>,
) -> AppResult<Json<ApiResponse<GlobalDoc>>> {
    let resp = content_service::put_global(&state, &user, &key, payload).await?;
    Ok(Json(resp))
}
