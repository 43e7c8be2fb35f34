use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Category, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub slug: String,
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
    pub name_ar: String,
    pub name_en: String,
    pub description_ar: Option<String>,
    pub description_en: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub stock: i32,
    pub image_url: Option<String>,
    pub company_slug: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub slug: Option<String>,
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
    pub description_ar: Option<String>,
    pub description_en: Option<String>,
    pub price: Option<i64>,
    pub sale_price: Option<i64>,
    /// Removes an existing sale price.
    #[serde(default)]
    pub clear_sale_price: bool,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub company_slug: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub slug: String,
    pub name_ar: String,
    pub name_en: String,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<Category>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
}
