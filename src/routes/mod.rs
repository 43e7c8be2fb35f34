use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod ai;
pub mod analytics;
pub mod auth;
pub mod content;
pub mod customers;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod search;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/categories", products::categories_router())
        .nest("/orders", orders::router())
        .nest("/auth", auth::router())
        .nest("/customers", customers::router())
        .nest("/payments", payments::router())
        .nest("/reviews", reviews::router())
        .nest("/admin", admin::router())
        .nest("/analytics", analytics::router())
        .nest("/content", content::router())
        .nest("/search", search::router())
        .nest("/ai", ai::router())
}
