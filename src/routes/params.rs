use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::locale::Locale;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// Query structs repeat `page`/`limit` instead of flattening `Pagination`:
// urlencoded numbers do not survive `#[serde(flatten)]`.
#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    /// Returns `(page, limit, offset)` with page ≥ 1 and limit clamped to 1..=100.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1) * limit;
        (page, limit, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct ProductQuery {
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
    pub q: Option<String>,
    pub category: Option<String>,
    pub company: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: Option<bool>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    /// Substring over order number, customer name and phone.
    pub search: Option<String>,
    /// Anonymous tracking lookup.
    pub order_number: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct SearchListQuery {
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
    pub search: Option<String>,
}

impl SearchListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct StatusListQuery {
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub method: Option<String>,
    pub role: Option<String>,
}

impl StatusListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct LowStockQuery {
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
    pub threshold: Option<i32>,
}

impl LowStockQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct LocaleQuery {
    pub locale: Option<Locale>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct BannerQuery {
    pub placement: Option<String>,
    pub company: Option<String>,
    pub locale: Option<Locale>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub locale: Option<Locale>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_page_and_limit() {
        assert_eq!(Pagination::default().normalize(), (1, 20, 0));
        assert_eq!(Pagination::new(Some(3), Some(10)).normalize(), (3, 10, 20));
        assert_eq!(Pagination::new(Some(0), Some(1000)).normalize(), (1, 100, 0));
        assert_eq!(Pagination::new(Some(-4), Some(0)).normalize(), (1, 1, 0));
    }

    #[test]
    fn order_query_parses_from_query_string() {
        let query: OrderListQuery =
            serde_urlencoded_like("page=2&limit=5&status=pending&search=0100");
        assert_eq!(query.pagination().normalize(), (2, 5, 5));
        assert_eq!(query.status.as_deref(), Some("pending"));
        assert_eq!(query.search.as_deref(), Some("0100"));
    }

    fn serde_urlencoded_like(raw: &str) -> OrderListQuery {
        let uri: axum::http::Uri = format!("/api/orders?{raw}").parse().unwrap();
        axum::extract::Query::<OrderListQuery>::try_from_uri(&uri)
            .unwrap()
            .0
    }
}
