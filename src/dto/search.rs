use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IndexRequest {
    /// Re-embed every product, not just new or changed ones.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Serialize, ToSchema, PartialEq, Eq)]
pub struct IndexReport {
    pub indexed: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IndexStatus {
    pub ai_enabled: bool,
    pub model: Option<String>,
    pub total_products: u64,
    pub indexed: u64,
    pub stale: u64,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    Keyword,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHit {
    pub title: String,
    pub score: Option<f32>,
    pub product: Product,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResults {
    pub mode: SearchMode,
    pub items: Vec<SearchHit>,
}
