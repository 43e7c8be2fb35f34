use crate::{
    dto::analytics::{AnalyticsSummary, DailyRevenue, StatusCount, TopProduct},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_dashboard},
    response::{ApiResponse, Meta},
    routes::params::AnalyticsQuery,
    services::product_service::DEFAULT_LOW_STOCK_THRESHOLD,
    state::AppState,
};

const DEFAULT_DAYS: i64 = 30;
const MAX_DAYS: i64 = 365;

pub fn normalize_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

pub async fn summary(
    state: &AppState,
    user: &AuthUser,
    query: AnalyticsQuery,
) -> AppResult<ApiResponse<AnalyticsSummary>> {
    ensure_dashboard(user)?;
    let days = normalize_days(query.days);
    let pool = &state.pool;

    let (revenue, order_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(total), 0)::BIGINT, COUNT(*)::BIGINT
        FROM orders
        WHERE status <> 'cancelled'
          AND created_at >= now() - make_interval(days => $1::INT)
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let orders_by_status = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*)::BIGINT AS count
        FROM orders
        WHERE created_at >= now() - make_interval(days => $1::INT)
        GROUP BY status
        ORDER BY count DESC
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    let (new_customers,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*)::BIGINT FROM customers WHERE created_at >= now() - make_interval(days => $1::INT)",
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let (low_stock_products,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*)::BIGINT FROM products WHERE is_active AND stock <= $1",
    )
    .bind(DEFAULT_LOW_STOCK_THRESHOLD)
    .fetch_one(pool)
    .await?;

    let top_products = sqlx::query_as::<_, TopProduct>(
        r#"
        SELECT oi.product_id,
               MAX(oi.product_name) AS product_name,
               SUM(oi.quantity)::BIGINT AS quantity,
               SUM(oi.quantity::BIGINT * oi.price_at_time)::BIGINT AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.status <> 'cancelled'
          AND o.created_at >= now() - make_interval(days => $1::INT)
        GROUP BY oi.product_id
        ORDER BY quantity DESC
        LIMIT 10
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    let daily_revenue = sqlx::query_as::<_, DailyRevenue>(
        r#"
        SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day,
               COALESCE(SUM(total), 0)::BIGINT AS revenue,
               COUNT(*)::BIGINT AS orders
        FROM orders
        WHERE status <> 'cancelled'
          AND created_at >= now() - make_interval(days => $1::INT)
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    let average_order_value = if order_count > 0 {
        revenue / order_count
    } else {
        0
    };

    Ok(ApiResponse::success(
        "Analytics",
        AnalyticsSummary {
            days,
            revenue,
            order_count,
            average_order_value,
            orders_by_status,
            new_customers,
            low_stock_products,
            top_products,
            daily_revenue,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_window_is_clamped() {
        assert_eq!(normalize_days(None), 30);
        assert_eq!(normalize_days(Some(0)), 1);
        assert_eq!(normalize_days(Some(9999)), 365);
        assert_eq!(normalize_days(Some(7)), 7);
    }
}
