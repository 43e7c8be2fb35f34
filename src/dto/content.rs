use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::Banner;

#[derive(Debug, Deserialize, ToSchema)]
pub struct BannerRequest {
    pub title_ar: String,
    pub title_en: String,
    pub subtitle_ar: Option<String>,
    pub subtitle_en: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub placement: Option<String>,
    pub company_slug: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BannerList {
    pub items: Vec<Banner>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PageRequest {
    pub kind: Option<String>,
    pub title_ar: String,
    pub title_en: String,
    #[serde(default)]
    pub body_ar: String,
    #[serde(default)]
    pub body_en: String,
    #[serde(default)]
    pub published: bool,
}

/// A page rendered for one locale.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocalizedPage {
    pub slug: String,
    pub kind: String,
    pub locale: String,
    pub title: String,
    pub body: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GlobalRequest {
    #[schema(value_type = Object)]
    pub data: Value,
}
