use uuid::Uuid;

use crate::{
    audit,
    dto::products::{
        CategoryList, CreateCategoryRequest, CreateProductRequest, InventoryAdjustRequest,
        ProductList, UpdateProductRequest,
    },
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories},
        products::{self, ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_dashboard},
    models::{Category, Product},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, ProductQuery, ProductSortBy, SortOrder},
    services::escape_like,
    state::AppState,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::ActiveValue::NotSet;
use chrono::Utc;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

fn validate_slug(slug: &str) -> AppResult<String> {
    let slug = slug.trim().to_lowercase();
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::BadRequest("Slug must be lowercase letters, digits or dashes".into()));
    }
    Ok(slug)
}

fn validate_pricing(price: i64, sale_price: Option<i64>, stock: i32) -> AppResult<()> {
    if price < 0 || sale_price.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("Price cannot be negative".into()));
    }
    if stock < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }
    Ok(())
}

pub async fn list_products(
    state: &AppState,
    caller: Option<&AuthUser>,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if !caller.is_some_and(AuthUser::is_dashboard) {
        condition = condition.add(Column::IsActive.eq(true));
    }

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::NameAr).ilike(pattern.clone()))
                .add(Expr::col(Column::NameEn).ilike(pattern.clone()))
                .add(Expr::col(Column::Sku).ilike(pattern)),
        );
    }

    if let Some(slug) = query.category.as_ref().filter(|s| !s.is_empty()) {
        let category = Categories::find()
            .filter(CategoryCol::Slug.eq(slug.clone()))
            .one(&state.orm)
            .await?;
        match category {
            Some(category) => condition = condition.add(Column::CategoryId.eq(category.id)),
            None => {
                return Ok(ApiResponse::success(
                    "Products",
                    ProductList { items: Vec::new() },
                    Some(Meta::new(page, limit, 0)),
                ));
            }
        }
    }

    if let Some(company) = query.company.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::CompanySlug.eq(company.clone()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if query.in_stock == Some(true) {
        condition = condition.add(Column::Stock.gt(0));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::NameEn,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductList { items };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

/// Active products whose name or description mentions any of `terms`.
pub async fn find_matching(
    state: &AppState,
    terms: &[String],
    limit: u64,
) -> AppResult<Vec<products::Model>> {
    if terms.is_empty() {
        return Ok(Vec::new());
    }
    let mut any = Condition::any();
    for term in terms {
        let pattern = format!("%{}%", escape_like(term));
        any = any
            .add(Expr::col(Column::NameAr).ilike(pattern.clone()))
            .add(Expr::col(Column::NameEn).ilike(pattern.clone()))
            .add(Expr::col(Column::DescriptionAr).ilike(pattern.clone()))
            .add(Expr::col(Column::DescriptionEn).ilike(pattern));
    }

    let products = Products::find()
        .filter(Column::IsActive.eq(true))
        .filter(any)
        .order_by_desc(Column::Stock)
        .limit(limit)
        .all(&state.orm)
        .await?;
    Ok(products)
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .map(Product::from);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn get_product_by_slug(state: &AppState, slug: &str) -> AppResult<ApiResponse<Product>> {
    let result = Products::find()
        .filter(Column::Slug.eq(slug))
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .map(Product::from)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_dashboard(user)?;
    let slug = validate_slug(&payload.slug)?;
    validate_pricing(payload.price, payload.sale_price, payload.stock)?;
    if payload.name_ar.trim().is_empty() && payload.name_en.trim().is_empty() {
        return Err(AppError::BadRequest("Product name is required".into()));
    }

    let slug_taken = Products::find()
        .filter(Column::Slug.eq(slug.clone()))
        .count(&state.orm)
        .await?;
    if slug_taken > 0 {
        return Err(AppError::BadRequest("Slug is already taken".into()));
    }

    let id = Uuid::new_v4();
    let active = ActiveModel {
        id: Set(id),
        category_id: Set(payload.category_id),
        slug: Set(slug),
        sku: Set(payload.sku),
        name_ar: Set(payload.name_ar),
        name_en: Set(payload.name_en),
        description_ar: Set(payload.description_ar),
        description_en: Set(payload.description_en),
        price: Set(payload.price),
        sale_price: Set(payload.sale_price),
        stock: Set(payload.stock),
        image_url: Set(payload.image_url),
        company_slug: Set(payload.company_slug),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_dashboard(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let price = payload.price.unwrap_or(existing.price);
    let sale_price = if payload.clear_sale_price {
        None
    } else {
        payload.sale_price.or(existing.sale_price)
    };
    let stock = payload.stock.unwrap_or(existing.stock);
    validate_pricing(price, sale_price, stock)?;

    let mut active: ActiveModel = existing.into();
    if let Some(slug) = payload.slug {
        active.slug = Set(validate_slug(&slug)?);
    }
    if let Some(sku) = payload.sku {
        active.sku = Set(Some(sku));
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(name) = payload.name_ar {
        active.name_ar = Set(name);
    }
    if let Some(name) = payload.name_en {
        active.name_en = Set(name);
    }
    if let Some(description) = payload.description_ar {
        active.description_ar = Set(Some(description));
    }
    if let Some(description) = payload.description_en {
        active.description_en = Set(Some(description));
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    if let Some(company_slug) = payload.company_slug {
        active.company_slug = Set(Some(company_slug));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.price = Set(price);
    active.sale_price = Set(sale_price);
    active.stock = Set(stock);
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

/// Products referenced by orders are deactivated instead of deleted.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_dashboard(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let ordered: (i64,) =
        sqlx::query_as("SELECT COUNT(*)::BIGINT FROM order_items WHERE product_id = $1")
            .bind(id)
            .fetch_one(&state.pool)
            .await?;

    let archived = ordered.0 > 0;
    if archived {
        let mut active: ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        active.update(&state.orm).await?;
    } else {
        Products::delete_by_id(id).exec(&state.orm).await?;
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        if archived { "product_archive" } else { "product_delete" },
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        if archived { "Archived" } else { "Deleted" },
        serde_json::json!({ "archived": archived }),
        Some(Meta::empty()),
    ))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(CategoryCol::NameEn)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    Ok(ApiResponse::success("Categories", CategoryList { items }, None))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_dashboard(user)?;
    let slug = validate_slug(&payload.slug)?;
    let taken = Categories::find()
        .filter(CategoryCol::Slug.eq(slug.clone()))
        .count(&state.orm)
        .await?;
    if taken > 0 {
        return Err(AppError::BadRequest("Slug is already taken".into()));
    }

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        slug: Set(slug),
        name_ar: Set(payload.name_ar),
        name_en: Set(payload.name_en),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Category created",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_dashboard(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Products::find()
        .filter(Column::Stock.lte(threshold))
        .filter(Column::IsActive.eq(true));
    finder = finder
        .order_by_asc(Column::Stock)
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let data = ProductList { items };
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", data, Some(meta)))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_dashboard(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let new_stock = product
        .stock
        .checked_add(payload.delta)
        .filter(|s| *s >= 0)
        .ok_or_else(|| AppError::BadRequest("stock cannot be negative".into()))?;

    let mut active: ActiveModel = product.into();
    active.stock = Set(new_stock);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": updated.id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        Product::from(updated),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercased_and_checked() {
        assert_eq!(validate_slug(" Ferris-Mug ").unwrap(), "ferris-mug");
        assert!(validate_slug("no spaces").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn pricing_rejects_negatives() {
        assert!(validate_pricing(100, Some(80), 3).is_ok());
        assert!(validate_pricing(-1, None, 3).is_err());
        assert!(validate_pricing(100, Some(-5), 3).is_err());
        assert!(validate_pricing(100, None, -1).is_err());
    }
}
