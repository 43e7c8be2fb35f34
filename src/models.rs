use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    banners, categories, customers, globals, order_items, orders, pages, payments, products,
    reviews, users,
};

/// Declares a string-backed enum stored as text in the database.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {}: {other}", stringify!($name))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role {
    Admin => "admin",
    Staff => "staff",
    Customer => "customer",
});

impl Role {
    /// Admin and staff accounts may use the dashboard.
    pub fn is_dashboard(self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

text_enum!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match (self, next) {
            (a, b) if a == b => false,
            (OrderStatus::Cancelled, _) => false,
            (OrderStatus::Delivered, _) => false,
            _ => true,
        }
    }
}

text_enum!(PaymentMethod {
    CashOnDelivery => "cash-on-delivery",
    Card => "card",
    BankTransfer => "bank-transfer",
    Wallet => "wallet",
});

text_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

text_enum!(ReviewStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

text_enum!(PageKind {
    Page => "page",
    Company => "company",
    Legal => "legal",
});

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
}

impl From<customers::Model> for Customer {
    fn from(model: customers::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            email: model.email,
            is_guest: model.is_guest,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub slug: String,
    pub name_ar: String,
    pub name_en: String,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            slug: model.slug,
            name_ar: model.name_ar,
            name_en: model.name_en,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub slug: String,
    pub sku: Option<String>,
    pub name_ar: String,
    pub name_en: String,
    pub description_ar: Option<String>,
    pub description_en: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub effective_price: i64,
    pub stock: i32,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub company_slug: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        let effective_price = model.effective_price();
        Self {
            id: model.id,
            category_id: model.category_id,
            slug: model.slug,
            sku: model.sku,
            name_ar: model.name_ar,
            name_en: model.name_en,
            description_ar: model.description_ar,
            description_en: model.description_en,
            price: model.price,
            sale_price: model.sale_price,
            effective_price,
            stock: model.stock,
            in_stock: model.stock > 0,
            image_url: model.image_url,
            company_slug: model.company_slug,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub city: String,
    pub address: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    pub shipping_address: ShippingAddress,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            status: model.status,
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            shipping_address: ShippingAddress {
                full_name: model.shipping_name,
                phone: model.shipping_phone,
                city: model.shipping_city,
                address: model.shipping_address,
                notes: model.shipping_notes,
            },
            subtotal: model.subtotal,
            shipping_cost: model.shipping_cost,
            total: model.total,
            locale: model.locale,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_time: i64,
    pub line_total: i64,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name: model.product_name,
            quantity: model.quantity,
            price_at_time: model.price_at_time,
            line_total: model.price_at_time * i64::from(model.quantity),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub method: String,
    pub status: String,
    pub amount: i64,
    pub transaction_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<payments::Model> for Payment {
    fn from(model: payments::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            method: model.method,
            status: model.status,
            amount: model.amount,
            transaction_ref: model.transaction_ref,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub customer_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<reviews::Model> for Review {
    fn from(model: reviews::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            customer_id: model.customer_id,
            rating: model.rating,
            comment: model.comment,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Banner {
    pub id: Uuid,
    pub title_ar: String,
    pub title_en: String,
    pub subtitle_ar: Option<String>,
    pub subtitle_en: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub placement: String,
    pub company_slug: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub sort_order: i32,
}

impl From<banners::Model> for Banner {
    fn from(model: banners::Model) -> Self {
        Self {
            id: model.id,
            title_ar: model.title_ar,
            title_en: model.title_en,
            subtitle_ar: model.subtitle_ar,
            subtitle_en: model.subtitle_en,
            image_url: model.image_url,
            link_url: model.link_url,
            placement: model.placement,
            company_slug: model.company_slug,
            starts_at: model.starts_at.map(|dt| dt.with_timezone(&Utc)),
            ends_at: model.ends_at.map(|dt| dt.with_timezone(&Utc)),
            is_active: model.is_active,
            sort_order: model.sort_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub id: Uuid,
    pub slug: String,
    pub kind: String,
    pub title_ar: String,
    pub title_en: String,
    pub body_ar: String,
    pub body_en: String,
    pub published: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<pages::Model> for Page {
    fn from(model: pages::Model) -> Self {
        Self {
            id: model.id,
            slug: model.slug,
            kind: model.kind,
            title_ar: model.title_ar,
            title_en: model.title_en,
            body_ar: model.body_ar,
            body_en: model.body_en,
            published: model.published,
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GlobalDoc {
    pub key: String,
    #[schema(value_type = Object)]
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

impl From<globals::Model> for GlobalDoc {
    fn from(model: globals::Model) -> Self {
        Self {
            key: model.key,
            data: model.data,
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_method_uses_kebab_case_text() {
        assert_eq!(PaymentMethod::CashOnDelivery.as_str(), "cash-on-delivery");
        assert_eq!(
            "cash-on-delivery".parse::<PaymentMethod>(),
            Ok(PaymentMethod::CashOnDelivery)
        );
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank-transfer\"");
        assert!("cod".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn terminal_order_statuses_do_not_transition() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn dashboard_roles() {
        assert!(Role::Admin.is_dashboard());
        assert!(Role::Staff.is_dashboard());
        assert!(!Role::Customer.is_dashboard());
    }
}
