use std::collections::HashMap;

use chrono::Utc;
use futures::StreamExt;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    ai::{error::AiError, gemini::EmbedTask},
    dto::search::{
        IndexReport, IndexRequest, IndexStatus, SearchHit, SearchMode, SearchResults,
    },
    entity::{
        product_embeddings::{self, ActiveModel as EmbeddingActive, Entity as ProductEmbeddings},
        products::{self, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    locale::Locale,
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::SearchQuery,
    services::product_service,
    state::AppState,
};

const EMBED_CONCURRENCY: usize = 4;
const DEFAULT_SEARCH_LIMIT: i64 = 10;
const MAX_SEARCH_LIMIT: i64 = 50;
const MAX_QUERY_CHARS: usize = 200;
const MAX_TERMS: usize = 6;
const MIN_SIMILARITY: f32 = 0.35;

/// Text embedded for a product: both names, descriptions and the owning company.
pub fn product_document(product: &products::Model) -> String {
    let mut parts = vec![product.name_en.as_str(), product.name_ar.as_str()];
    if let Some(description) = product.description_en.as_deref() {
        parts.push(description);
    }
    if let Some(description) = product.description_ar.as_deref() {
        parts.push(description);
    }
    if let Some(company) = product.company_slug.as_deref() {
        parts.push(company);
    }
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Keyword terms for a free-text query: the whole phrase first, then its words.
pub fn search_terms(query: &str) -> Vec<String> {
    let phrase = query.trim().to_lowercase();
    if phrase.is_empty() {
        return Vec::new();
    }
    let mut terms = vec![phrase.clone()];
    for word in phrase.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() >= 2 && !terms.iter().any(|t| t == word) {
            terms.push(word.to_string());
        }
        if terms.len() >= MAX_TERMS {
            break;
        }
    }
    terms
}

fn needs_index(
    product: &products::Model,
    existing: Option<&product_embeddings::Model>,
    model: &str,
    force: bool,
) -> bool {
    match existing {
        _ if force => true,
        None => true,
        Some(embedding) => embedding.model != model || embedding.indexed_at < product.updated_at,
    }
}

fn normalize_limit(limit: Option<i64>) -> u64 {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT) as u64
}

pub async fn index_embeddings(
    state: &AppState,
    user: &AuthUser,
    payload: IndexRequest,
) -> AppResult<ApiResponse<IndexReport>> {
    ensure_admin(user)?;
    let client = state.gemini()?;
    let model = client.embedding_model().to_string();

    let products = Products::find()
        .filter(ProdCol::IsActive.eq(true))
        .all(&state.orm)
        .await?;
    let existing: HashMap<Uuid, product_embeddings::Model> = ProductEmbeddings::find()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|e| (e.product_id, e))
        .collect();

    let mut report = IndexReport::default();
    let mut pending = Vec::new();
    for product in products {
        if needs_index(&product, existing.get(&product.id), &model, payload.force) {
            pending.push(product);
        } else {
            report.skipped += 1;
        }
    }

    let results: Vec<(Uuid, Result<Vec<f32>, AiError>)> = futures::stream::iter(pending)
        .map(|product| async move {
            let document = product_document(&product);
            (product.id, client.embed(&document, EmbedTask::Document).await)
        })
        .buffer_unordered(EMBED_CONCURRENCY)
        .collect()
        .await;

    for (product_id, result) in results {
        let values = match result {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(%product_id, error = %err, "embedding failed");
                report.failed += 1;
                continue;
            }
        };
        let row = EmbeddingActive {
            product_id: Set(product_id),
            embedding: Set(serde_json::json!(values)),
            model: Set(model.clone()),
            indexed_at: Set(Utc::now().into()),
        };
        ProductEmbeddings::insert(row)
            .on_conflict(
                OnConflict::column(product_embeddings::Column::ProductId)
                    .update_columns([
                        product_embeddings::Column::Embedding,
                        product_embeddings::Column::Model,
                        product_embeddings::Column::IndexedAt,
                    ])
                    .to_owned(),
            )
            .exec(&state.orm)
            .await?;
        report.indexed += 1;
    }

    tracing::info!(
        indexed = report.indexed,
        skipped = report.skipped,
        failed = report.failed,
        force = payload.force,
        "embedding index updated"
    );

    Ok(ApiResponse::success(
        "Embeddings indexed",
        report,
        Some(Meta::empty()),
    ))
}

pub async fn index_status(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<IndexStatus>> {
    ensure_admin(user)?;
    let model = state.gemini.as_ref().map(|c| c.embedding_model().to_string());

    let products = Products::find()
        .filter(ProdCol::IsActive.eq(true))
        .all(&state.orm)
        .await?;
    let existing: HashMap<Uuid, product_embeddings::Model> = ProductEmbeddings::find()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|e| (e.product_id, e))
        .collect();

    let total_products = products.len() as u64;
    let stale = products
        .iter()
        .filter(|p| match (existing.get(&p.id), model.as_deref()) {
            (None, _) => true,
            (Some(e), Some(current)) => needs_index(p, Some(e), current, false),
            (Some(e), None) => e.indexed_at < p.updated_at,
        })
        .count() as u64;

    Ok(ApiResponse::success(
        "Embedding index status",
        IndexStatus {
            ai_enabled: state.gemini.is_some(),
            model,
            total_products,
            indexed: total_products - stale,
            stale,
        },
        None,
    ))
}

fn hit(product: products::Model, locale: Locale, score: Option<f32>) -> SearchHit {
    SearchHit {
        title: locale.pick(&product.name_ar, &product.name_en).to_string(),
        score,
        product: Product::from(product),
    }
}

async fn semantic_hits(
    state: &AppState,
    query: &str,
    locale: Locale,
    limit: u64,
) -> AppResult<Vec<SearchHit>> {
    let Some(client) = state.gemini.as_ref() else {
        return Ok(Vec::new());
    };
    if ProductEmbeddings::find().count(&state.orm).await? == 0 {
        return Ok(Vec::new());
    }

    let query_vector = match client.embed(query, EmbedTask::Query).await {
        Ok(vector) => vector,
        Err(err) => {
            tracing::warn!(error = %err, "query embedding failed, using keyword search");
            return Ok(Vec::new());
        }
    };
    let rows = ProductEmbeddings::find()
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut scored: Vec<(f32, products::Model)> = rows
        .into_iter()
        .filter_map(|(embedding, product)| {
            let product = product.filter(|p| p.is_active)?;
            let vector: Vec<f32> = serde_json::from_value(embedding.embedding).ok()?;
            let score = cosine_similarity(&query_vector, &vector)?;
            (score >= MIN_SIMILARITY).then_some((score, product))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    Ok(scored
        .into_iter()
        .take(limit as usize)
        .map(|(score, product)| hit(product, locale, Some(score)))
        .collect())
}

/// Semantic product search, falling back to keyword matching when the AI
/// provider is unavailable or nothing scores high enough.
pub async fn search(state: &AppState, query: SearchQuery) -> AppResult<ApiResponse<SearchResults>> {
    let text = query.q.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(AppError::BadRequest("Search query is required".into()));
    }
    if text.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::BadRequest("Search query is too long".into()));
    }
    let locale = query.locale.unwrap_or_default();
    let limit = normalize_limit(query.limit);

    let semantic = semantic_hits(state, text, locale, limit).await?;

    let results = if semantic.is_empty() {
        let items = product_service::find_matching(state, &search_terms(text), limit)
            .await?
            .into_iter()
            .map(|p| hit(p, locale, None))
            .collect();
        SearchResults {
            mode: SearchMode::Keyword,
            items,
        }
    } else {
        SearchResults {
            mode: SearchMode::Semantic,
            items: semantic,
        }
    };

    Ok(ApiResponse::success("Search results", results, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn product() -> products::Model {
        let now = Utc::now();
        products::Model {
            id: Uuid::new_v4(),
            category_id: None,
            slug: "olive-oil".into(),
            sku: None,
            name_ar: "زيت زيتون".into(),
            name_en: "Olive Oil".into(),
            description_ar: None,
            description_en: Some("Cold pressed".into()),
            price: 120,
            sale_price: None,
            stock: 4,
            image_url: None,
            company_slug: Some("farms".into()),
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn cosine_similarity_handles_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), None);
        assert_eq!(cosine_similarity(&[], &[]), None);
    }

    #[test]
    fn terms_start_with_the_phrase() {
        assert_eq!(
            search_terms("  Olive OIL  "),
            vec!["olive oil".to_string(), "olive".into(), "oil".into()]
        );
        assert_eq!(search_terms("زيت"), vec!["زيت".to_string()]);
        assert!(search_terms("   ").is_empty());
        assert!(search_terms("a b c d e f g h i j").len() <= MAX_TERMS);
    }

    #[test]
    fn document_includes_both_languages() {
        let doc = product_document(&product());
        assert!(doc.contains("Olive Oil"));
        assert!(doc.contains("زيت زيتون"));
        assert!(doc.contains("Cold pressed"));
        assert!(doc.contains("farms"));
    }

    #[test]
    fn staleness_follows_updates_and_model() {
        let mut p = product();
        let embedding = product_embeddings::Model {
            product_id: p.id,
            embedding: serde_json::json!([0.1, 0.2]),
            model: "text-embedding-004".into(),
            indexed_at: Utc::now().into(),
        };
        assert!(!needs_index(&p, Some(&embedding), "text-embedding-004", false));
        assert!(needs_index(&p, Some(&embedding), "text-embedding-004", true));
        assert!(needs_index(&p, Some(&embedding), "other-model", false));
        assert!(needs_index(&p, None, "text-embedding-004", false));

        p.updated_at = (Utc::now() + Duration::minutes(5)).into();
        assert!(needs_index(&p, Some(&embedding), "text-embedding-004", false));
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(normalize_limit(None), 10);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(500)), 50);
    }
}
