use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsSummary {
    pub days: i64,
    pub revenue: i64,
    pub order_count: i64,
    pub average_order_value: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub new_customers: i64,
    pub low_stock_products: i64,
    pub top_products: Vec<TopProduct>,
    pub daily_revenue: Vec<DailyRevenue>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct DailyRevenue {
    pub day: chrono::NaiveDate,
    pub revenue: i64,
    pub orders: i64,
}
