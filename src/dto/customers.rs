use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Customer;

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerSummary {
    #[serde(flatten)]
    pub customer: Customer,
    pub order_count: i64,
    pub total_spent: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerList {
    pub items: Vec<CustomerSummary>,
}
