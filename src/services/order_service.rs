use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CreateOrderRequest, OrderLineRequest, OrderList, OrderLookup, OrderWithItems,
        TrackedOrder, UpdateOrderStatusRequest,
    },
    entity::{
        customers::{ActiveModel as CustomerActive, Column as CustomerCol, Entity as Customers},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payments::ActiveModel as PaymentActive,
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_dashboard},
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Role},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{customer_service::normalize_phone, escape_like},
    state::AppState,
};

pub const MAX_LINE_QUANTITY: i32 = 1000;

/// An order line priced against the catalog at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_time: i64,
}

impl PricedLine {
    pub fn line_total(&self) -> i64 {
        self.price_at_time * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub total: i64,
}

pub fn shipping_cost(method: PaymentMethod, cod_surcharge: i64) -> i64 {
    match method {
        PaymentMethod::CashOnDelivery => cod_surcharge,
        _ => 0,
    }
}

pub fn compute_totals(lines: &[PricedLine], method: PaymentMethod, cod_surcharge: i64) -> OrderTotals {
    let subtotal = lines.iter().map(PricedLine::line_total).sum();
    let shipping_cost = shipping_cost(method, cod_surcharge);
    OrderTotals {
        subtotal,
        shipping_cost,
        total: subtotal + shipping_cost,
    }
}

/// Merge repeated product lines and validate quantities.
///
/// The result is sorted by product id so row locks are always taken in the same order.
pub fn merge_lines(items: &[OrderLineRequest]) -> AppResult<Vec<(Uuid, i32)>> {
    if items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }

    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid quantity for product {}",
                item.product_id
            )));
        }
        let entry = merged.entry(item.product_id).or_insert(0);
        *entry = entry.saturating_add(item.quantity);
        if *entry > MAX_LINE_QUANTITY {
            return Err(AppError::BadRequest(format!(
                "Quantity for product {} exceeds {MAX_LINE_QUANTITY}",
                item.product_id
            )));
        }
    }
    Ok(merged.into_iter().collect())
}

pub fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string().to_uppercase();
    format!("ORD-{}-{}", date, &suffix[..8])
}

pub async fn create_order(
    state: &AppState,
    caller: Option<&AuthUser>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let lines = merge_lines(&payload.items)?;
    let address = &payload.shipping_address;
    let phone = normalize_phone(&address.phone)?;
    for (field, value) in [
        ("full_name", &address.full_name),
        ("city", &address.city),
        ("address", &address.address),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("Shipping {field} is required")));
        }
    }

    let txn = state.orm.begin().await?;

    let product_ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .filter(ProdCol::IsActive.eq(true))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut priced = Vec::with_capacity(lines.len());
    for (product_id, quantity) in &lines {
        let product = products
            .get(product_id)
            .ok_or_else(|| AppError::BadRequest(format!("Product {product_id} not found")))?;
        let name = payload.locale.pick(&product.name_ar, &product.name_en).to_string();
        if product.stock < *quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {name}: requested {quantity}, available {}",
                product.stock
            )));
        }
        priced.push(PricedLine {
            product_id: *product_id,
            product_name: name,
            quantity: *quantity,
            price_at_time: product.effective_price(),
        });
    }

    // Conditional decrement: a concurrent order that drained the stock first
    // leaves zero affected rows here and the whole transaction is dropped.
    for line in &priced {
        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(line.product_id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(&txn)
            .await?;
        if result.rows_affected != 1 {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                line.product_name
            )));
        }
    }

    let totals = compute_totals(&priced, payload.payment_method, state.config.cod_surcharge);
    let customer_id = resolve_customer(&txn, caller, &payload, &phone).await?;

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id)),
        customer_id: Set(customer_id),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_method: Set(payload.payment_method.as_str().into()),
        payment_status: Set(PaymentStatus::Pending.as_str().into()),
        shipping_name: Set(address.full_name.trim().to_string()),
        shipping_phone: Set(phone),
        shipping_city: Set(address.city.trim().to_string()),
        shipping_address: Set(address.address.trim().to_string()),
        shipping_notes: Set(address.notes.clone().filter(|n| !n.trim().is_empty())),
        subtotal: Set(totals.subtotal),
        shipping_cost: Set(totals.shipping_cost),
        total: Set(totals.total),
        locale: Set(payload.locale.as_str().into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for line in &priced {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            quantity: Set(line.quantity),
            price_at_time: Set(line.price_at_time),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(item));
    }

    PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        method: Set(payload.payment_method.as_str().into()),
        status: Set(PaymentStatus::Pending.as_str().into()),
        amount: Set(totals.total),
        transaction_ref: Set(None),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = order.total,
        "order created"
    );
    audit::record(
        &state.pool,
        caller.map(|u| u.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "customer_id": customer_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// The signed-in customer, or the customer matching the shipping phone, or a new guest.
async fn resolve_customer(
    conn: &DatabaseTransaction,
    caller: Option<&AuthUser>,
    payload: &CreateOrderRequest,
    phone: &str,
) -> AppResult<Uuid> {
    if let Some(user) = caller.filter(|u| u.role == Role::Customer) {
        let exists = Customers::find_by_id(user.user_id).one(conn).await?;
        return exists.map(|c| c.id).ok_or(AppError::Unauthorized);
    }

    if let Some(id) = customer_by_phone(conn, phone).await? {
        return Ok(id);
    }

    let mut email = payload
        .email
        .as_ref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    // An email already on another account stays with that account; the guest
    // row is keyed by phone only.
    if let Some(address) = email.as_deref() {
        let taken = Customers::find()
            .filter(CustomerCol::Email.eq(address))
            .count(conn)
            .await?
            > 0;
        if taken {
            tracing::debug!("guest email already registered, not copied to guest record");
            email = None;
        }
    }

    let mut guest = CustomerActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.shipping_address.full_name.trim().to_string()),
        phone: Set(phone.to_string()),
        email: Set(email),
        password_hash: Set(None),
        is_guest: Set(true),
        created_at: NotSet,
    };
    // A concurrent checkout with the same phone may insert first; its row is
    // then reused. An email collision rolls back to the savepoint only.
    let attempt = conn.begin().await?;
    let inserted = match insert_guest(&attempt, guest.clone()).await {
        Ok(rows) => {
            attempt.commit().await?;
            rows
        }
        Err(err) => {
            attempt.rollback().await?;
            tracing::warn!(error = %err, "guest insert failed, retrying without email");
            guest.email = Set(None);
            insert_guest(conn, guest).await?
        }
    };

    let id = customer_by_phone(conn, phone)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("guest customer missing after insert")))?;
    if inserted > 0 {
        tracing::debug!(customer_id = %id, "guest customer created");
    }
    Ok(id)
}

async fn insert_guest<C: ConnectionTrait>(conn: &C, guest: CustomerActive) -> Result<u64, DbErr> {
    Customers::insert(guest)
        .on_conflict(OnConflict::column(CustomerCol::Phone).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await
}

async fn customer_by_phone<C: ConnectionTrait>(conn: &C, phone: &str) -> AppResult<Option<Uuid>> {
    Ok(Customers::find()
        .filter(CustomerCol::Phone.eq(phone))
        .one(conn)
        .await?
        .map(|c| c.id))
}

pub async fn list_orders(
    state: &AppState,
    caller: Option<&AuthUser>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderLookup>> {
    match caller {
        Some(user) if user.is_dashboard() => list_filtered(state, None, query).await,
        Some(user) => list_filtered(state, Some(user.user_id), query).await,
        None => {
            let order_number = query
                .order_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or(AppError::Unauthorized)?;
            let tracked = track_order(state, order_number).await?;
            Ok(ApiResponse::success(
                "Order",
                OrderLookup::Tracked(tracked),
                Some(Meta::empty()),
            ))
        }
    }
}

async fn list_filtered(
    state: &AppState,
    customer_id: Option<Uuid>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderLookup>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(customer_id) = customer_id {
        condition = condition.add(OrderCol::CustomerId.eq(customer_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(status) = query.payment_status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::PaymentStatus.eq(status.clone()));
    }
    if let Some(number) = query.order_number.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::OrderNumber.eq(number.trim()));
    }
    // Search across order number, name and phone is a dashboard feature.
    let search = query
        .search
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && customer_id.is_none());
    if let Some(search) = search {
        let pattern = format!("%{}%", escape_like(search));
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::ShippingName).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::ShippingPhone).ilike(pattern)),
        );
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderLookup::List(OrderList { items: orders }),
        Some(meta),
    ))
}

pub async fn track_order(state: &AppState, order_number: &str) -> AppResult<TrackedOrder> {
    let order = Orders::find()
        .filter(OrderCol::OrderNumber.eq(order_number))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = load_items(&state.orm, order.id).await?;
    Ok(TrackedOrder::redact(Order::from(order), items))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if !user.is_dashboard() {
        condition = condition.add(OrderCol::CustomerId.eq(user.user_id));
    }

    let order = Orders::find()
        .filter(condition)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_dashboard(user)?;
    let next = payload
        .status
        .parse::<OrderStatus>()
        .map_err(|_| AppError::BadRequest("Invalid order status".into()))?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let current = existing
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {current} to {next}"
        )));
    }

    if next == OrderStatus::Cancelled {
        restock(&txn, existing.id).await?;
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current.as_str(), "status": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

async fn restock<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?;
    for item in items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

pub async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            product_name: "item".into(),
            quantity,
            price_at_time: price,
        }
    }

    #[test]
    fn cash_on_delivery_adds_flat_surcharge() {
        let lines = vec![line(120, 2), line(35, 3)];
        let totals = compute_totals(&lines, PaymentMethod::CashOnDelivery, 50);
        assert_eq!(totals.subtotal, 345);
        assert_eq!(totals.shipping_cost, 50);
        assert_eq!(totals.total, 395);
    }

    #[test]
    fn other_methods_ship_free() {
        let lines = vec![line(999, 1)];
        for method in [PaymentMethod::Card, PaymentMethod::BankTransfer, PaymentMethod::Wallet] {
            let totals = compute_totals(&lines, method, 50);
            assert_eq!(totals.shipping_cost, 0);
            assert_eq!(totals.total, totals.subtotal);
        }
    }

    #[test]
    fn merges_duplicate_lines_in_id_order() {
        let a = Uuid::from_u128(2);
        let b = Uuid::from_u128(1);
        let merged = merge_lines(&[
            OrderLineRequest { product_id: a, quantity: 1 },
            OrderLineRequest { product_id: b, quantity: 4 },
            OrderLineRequest { product_id: a, quantity: 2 },
        ])
        .unwrap();
        assert_eq!(merged, vec![(b, 4), (a, 3)]);
    }

    #[test]
    fn rejects_empty_and_non_positive_lines() {
        assert!(matches!(merge_lines(&[]), Err(AppError::BadRequest(_))));
        let bad = [OrderLineRequest {
            product_id: Uuid::new_v4(),
            quantity: 0,
        }];
        assert!(matches!(merge_lines(&bad), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn order_number_has_date_and_suffix() {
        let id = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let number = build_order_number(id);
        assert!(number.starts_with("ORD-"));
        assert!(number.ends_with("-A1B2C3D4"));
        assert_eq!(number.len(), "ORD-20260101-A1B2C3D4".len());
    }
}
