use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Payment;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentRequest {
    pub status: String,
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}
