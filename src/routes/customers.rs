use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        auth::{CustomerLoginRequest, CustomerRegisterRequest, LoginResponse},
        customers::{CustomerList, CustomerSummary},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Customer,
    response::ApiResponse,
    routes::params::SearchListQuery,
    services::customer_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/{id}", get(get_customer))
}

#[utoipa::path(
    post,
    path = "/api/customers/register",
    request_body = CustomerRegisterRequest,
    responses(
        (status = 201, description = "Customer registered", body = ApiResponse<LoginResponse>),
        (status = 409, description = "Phone or email already registered"),
    ),
    tag = "Customers"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CustomerRegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<LoginResponse>>)> {
    let resp = customer_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/customers/login",
    request_body = CustomerLoginRequest,
    responses(
        (status = 200, description = "Customer login by phone or email", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "Customers"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CustomerLoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = customer_service::login(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/customers/me",
    responses(
        (status = 200, description = "Signed-in customer", body = ApiResponse<Customer>),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let resp = customer_service::me(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/customers",
    params(SearchListQuery),
    responses(
        (status = 200, description = "Customers with order totals", body = ApiResponse<CustomerList>),
        (status = 403, description = "Dashboard users only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchListQuery>,
) -> AppResult<Json<ApiResponse<CustomerList>>> {
    let resp = customer_service::list_customers(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer with order totals", body = ApiResponse<CustomerSummary>),
        (status = 404, description = "Customer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CustomerSummary>>> {
    let resp = customer_service::get_customer(&state, &user, id).await?;
    Ok(Json(resp))
}
