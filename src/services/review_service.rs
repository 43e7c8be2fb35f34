use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::{CreateReviewRequest, ModerateReviewRequest, ReviewList},
    entity::{
        products::{Column as ProdCol, Entity as Products},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer, ensure_dashboard},
    models::{Review, ReviewStatus},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, StatusListQuery},
    state::AppState,
};

const MAX_COMMENT_CHARS: usize = 2000;

fn average(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let avg = sum as f64 / ratings.len() as f64;
    Some((avg * 10.0).round() / 10.0)
}

pub async fn list_product_reviews(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();
    let condition = Condition::all()
        .add(ReviewCol::ProductId.eq(product_id))
        .add(ReviewCol::Status.eq(ReviewStatus::Approved.as_str()));

    let finder = Reviews::find()
        .filter(condition.clone())
        .order_by_desc(ReviewCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let ratings: Vec<i32> = Reviews::find()
        .select_only()
        .column(ReviewCol::Rating)
        .filter(condition)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList {
            items,
            average_rating: average(&ratings),
        },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    ensure_customer(user)?;
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("Rating must be between 1 and 5".into()));
    }
    let comment = payload
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
    {
        return Err(AppError::BadRequest("Comment is too long".into()));
    }

    let product = Products::find_by_id(product_id)
        .filter(ProdCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    let existing = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .filter(ReviewCol::CustomerId.eq(user.user_id))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict("You already reviewed this product".into()));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        customer_id: Set(user.user_id),
        rating: Set(payload.rating),
        comment: Set(comment),
        status: Set(ReviewStatus::Pending.as_str().into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Review submitted",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews(
    state: &AppState,
    user: &AuthUser,
    query: StatusListQuery,
) -> AppResult<ApiResponse<ReviewList>> {
    ensure_dashboard(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(ReviewCol::Status.eq(status.clone()));
    }

    let finder = Reviews::find()
        .filter(condition)
        .order_by_desc(ReviewCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList {
            items,
            average_rating: None,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn moderate_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ModerateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    ensure_dashboard(user)?;
    let status = payload
        .status
        .parse::<ReviewStatus>()
        .ok()
        .filter(|s| *s != ReviewStatus::Pending)
        .ok_or_else(|| AppError::BadRequest("Status must be approved or rejected".into()))?;

    let review = Reviews::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut active: ReviewActive = review.into();
    active.status = Set(status.as_str().into());
    let review = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "review_moderate",
        "reviews",
        serde_json::json!({ "review_id": review.id, "status": review.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review updated",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rounds_to_one_decimal() {
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[5, 4, 4]), Some(4.3));
        assert_eq!(average(&[1]), Some(1.0));
    }
}
