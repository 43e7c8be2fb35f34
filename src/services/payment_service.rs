use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{PaymentList, UpdatePaymentRequest},
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_dashboard},
    models::{Payment, PaymentStatus},
    response::{ApiResponse, Meta},
    routes::params::StatusListQuery,
    state::AppState,
};

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    query: StatusListQuery,
) -> AppResult<ApiResponse<PaymentList>> {
    ensure_dashboard(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(PaymentCol::Status.eq(status.clone()));
    }
    if let Some(method) = query.method.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(PaymentCol::Method.eq(method.clone()));
    }

    let finder = Payments::find()
        .filter(condition)
        .order_by_desc(PaymentCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Payment::from)
        .collect();

    Ok(ApiResponse::success(
        "Payments",
        PaymentList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Record a payment outcome and mirror it onto the order.
pub async fn update_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_dashboard(user)?;
    let status = payload
        .status
        .parse::<PaymentStatus>()
        .map_err(|_| AppError::BadRequest("Invalid payment status".into()))?;

    let txn = state.orm.begin().await?;
    let payment = Payments::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if payment.status == PaymentStatus::Refunded.as_str() {
        return Err(AppError::BadRequest("Refunded payments cannot change".into()));
    }
    if status == PaymentStatus::Refunded && payment.status != PaymentStatus::Paid.as_str() {
        return Err(AppError::BadRequest("Only paid payments can be refunded".into()));
    }

    let order_id = payment.order_id;
    let now = Utc::now();
    let mut active: PaymentActive = payment.into();
    active.status = Set(status.as_str().into());
    if let Some(reference) = payload.transaction_ref.filter(|r| !r.trim().is_empty()) {
        active.transaction_ref = Set(Some(reference));
    }
    if status == PaymentStatus::Paid {
        active.paid_at = Set(Some(now.into()));
    }
    active.updated_at = Set(now.into());
    let payment = active.update(&txn).await?;

    let order = Orders::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut order: OrderActive = order.into();
    order.payment_status = Set(status.as_str().into());
    order.updated_at = Set(now.into());
    order.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "payment_update",
        "payments",
        serde_json::json!({ "payment_id": payment.id, "order_id": order_id, "status": payment.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment updated",
        Payment::from(payment),
        Some(Meta::empty()),
    ))
}
