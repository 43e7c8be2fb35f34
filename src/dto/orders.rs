use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    locale::Locale,
    models::{Order, OrderItem, PaymentMethod, ShippingAddress},
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub email: Option<String>,
    #[serde(default)]
    pub locale: Locale,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Public tracking view: no address, phone or customer identity.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackedOrder {
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub city: String,
    pub items: Vec<TrackedItem>,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackedItem {
    pub product_name: String,
    pub quantity: i32,
}

impl TrackedOrder {
    pub fn redact(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            city: order.shipping_address.city,
            items: items
                .into_iter()
                .map(|item| TrackedItem {
                    product_name: item.product_name,
                    quantity: item.quantity,
                })
                .collect(),
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            created_at: order.created_at,
        }
    }
}

/// `GET /api/orders` answers with a page of orders or a single tracked order.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum OrderLookup {
    List(OrderList),
    Tracked(TrackedOrder),
}
