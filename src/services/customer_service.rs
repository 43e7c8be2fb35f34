use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{CustomerLoginRequest, CustomerRegisterRequest, LoginResponse},
    dto::customers::{CustomerList, CustomerSummary},
    entity::customers::{ActiveModel as CustomerActive, Column as CustomerCol, Entity as Customers},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer, ensure_dashboard},
    models::{Customer, Role},
    response::{ApiResponse, Meta},
    routes::params::SearchListQuery,
    services::{
        auth_service::{hash_password, issue_token, validate_password, verify_password},
        escape_like,
    },
    state::AppState,
};

/// Strip formatting from a phone number, keeping a leading `+`.
pub fn normalize_phone(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    let mut phone = String::with_capacity(trimmed.len());
    for (i, ch) in trimmed.chars().enumerate() {
        match ch {
            '0'..='9' => phone.push(ch),
            // Arabic-Indic digits typed on Arabic keyboards.
            '\u{0660}'..='\u{0669}' => {
                phone.push(char::from(b'0' + (ch as u32 - 0x0660) as u8));
            }
            '+' if i == 0 => phone.push('+'),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return Err(AppError::BadRequest("Invalid phone number".into())),
        }
    }

    let digits = phone.trim_start_matches('+').len();
    if !(7..=15).contains(&digits) {
        return Err(AppError::BadRequest("Invalid phone number".into()));
    }
    Ok(phone)
}

fn login_response(state: &AppState, customer: Customer) -> AppResult<LoginResponse> {
    let token = issue_token(
        state.config.jwt_secret.expose_secret(),
        customer.id,
        Role::Customer,
    )?;
    Ok(LoginResponse {
        token,
        user_type: Role::Customer.as_str().to_string(),
        user: None,
        customer: Some(customer),
    })
}

/// Register a customer account, claiming an earlier guest record with the same phone.
pub async fn register(
    state: &AppState,
    payload: CustomerRegisterRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    let phone = normalize_phone(&payload.phone)?;
    validate_password(&payload.password)?;
    let email = payload
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    if email.as_ref().is_some_and(|e| !e.contains('@')) {
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    if let Some(email) = &email {
        let taken = Customers::find()
            .filter(CustomerCol::Email.eq(email.clone()))
            .filter(CustomerCol::Phone.ne(phone.clone()))
            .count(&state.orm)
            .await?;
        if taken > 0 {
            return Err(AppError::BadRequest("Email is already taken".into()));
        }
    }

    let password_hash = hash_password(&payload.password)?;
    let existing = Customers::find()
        .filter(CustomerCol::Phone.eq(phone.clone()))
        .one(&state.orm)
        .await?;

    let customer = match existing {
        Some(existing) if !existing.is_guest => {
            return Err(AppError::BadRequest("Phone is already registered".into()));
        }
        Some(guest) => {
            let mut active: CustomerActive = guest.into();
            active.name = Set(name);
            active.email = Set(email);
            active.password_hash = Set(Some(password_hash));
            active.is_guest = Set(false);
            active.update(&state.orm).await?
        }
        None => {
            CustomerActive {
                id: Set(Uuid::new_v4()),
                name: Set(name),
                phone: Set(phone),
                email: Set(email),
                password_hash: Set(Some(password_hash)),
                is_guest: Set(false),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    audit::record(
        &state.pool,
        Some(customer.id),
        "customer_register",
        "customers",
        serde_json::json!({ "customer_id": customer.id }),
    )
    .await;

    let resp = login_response(state, Customer::from(customer))?;
    Ok(ApiResponse::success("Customer registered", resp, Some(Meta::empty())))
}

pub async fn login(
    state: &AppState,
    payload: CustomerLoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let login = payload.login.trim();
    let condition = if login.contains('@') {
        Condition::all().add(CustomerCol::Email.eq(login.to_lowercase()))
    } else {
        Condition::all().add(CustomerCol::Phone.eq(normalize_phone(login)?))
    };

    let customer = Customers::find().filter(condition).one(&state.orm).await?;
    let invalid = || AppError::BadRequest("Invalid credentials".into());
    let customer = customer.ok_or_else(invalid)?;
    let hash = customer.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&payload.password, hash)? {
        return Err(invalid());
    }

    let resp = login_response(state, Customer::from(customer))?;
    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Customer>> {
    ensure_customer(user)?;
    let customer = Customers::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Customer", Customer::from(customer), None))
}

/// `ILIKE` patterns for the customer search: one for name and email, one for
/// phone. Phones are stored normalized, so a term that is a phone number is
/// normalized before matching.
fn search_patterns(search: &str) -> (String, String) {
    let pattern = format!("%{}%", escape_like(search));
    let phone_pattern = normalize_phone(search)
        .map(|phone| format!("%{}%", escape_like(&phone)))
        .unwrap_or_else(|_| pattern.clone());
    (pattern, phone_pattern)
}

pub async fn list_customers(
    state: &AppState,
    user: &AuthUser,
    query: SearchListQuery,
) -> AppResult<ApiResponse<CustomerList>> {
    ensure_dashboard(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let (pattern, phone_pattern) = search_patterns(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(CustomerCol::Name).ilike(pattern.clone()))
                .add(Expr::col(CustomerCol::Phone).ilike(phone_pattern))
                .add(Expr::col(CustomerCol::Email).ilike(pattern)),
        );
    }

    let finder = Customers::find()
        .filter(condition)
        .order_by_desc(CustomerCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let customers = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = customers.iter().map(|c| c.id).collect();
    let stats = order_stats(state, &ids).await?;

    let items = customers
        .into_iter()
        .map(|c| {
            let (order_count, total_spent) = stats.get(&c.id).copied().unwrap_or((0, 0));
            CustomerSummary {
                customer: Customer::from(c),
                order_count,
                total_spent,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<CustomerSummary>> {
    ensure_dashboard(user)?;
    let customer = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let stats = order_stats(state, &[id]).await?;
    let (order_count, total_spent) = stats.get(&id).copied().unwrap_or((0, 0));
    Ok(ApiResponse::success(
        "Customer",
        CustomerSummary {
            customer: Customer::from(customer),
            order_count,
            total_spent,
        },
        Some(Meta::empty()),
    ))
}

/// Order count and non-cancelled spend per customer.
async fn order_stats(state: &AppState, ids: &[Uuid]) -> AppResult<HashMap<Uuid, (i64, i64)>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64, i64)> = sqlx::query_as(
        r#"
        SELECT customer_id,
               COUNT(*)::BIGINT,
               COALESCE(SUM(total) FILTER (WHERE status <> 'cancelled'), 0)::BIGINT
        FROM orders
        WHERE customer_id = ANY($1)
        GROUP BY customer_id
        "#,
    )
    .bind(ids)
    .fetch_all(&state.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, count, spent)| (id, (count, spent)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_formatted_phones() {
        assert_eq!(normalize_phone(" 010-1234 5678 ").unwrap(), "01012345678");
        assert_eq!(normalize_phone("+20 (10) 1234.5678").unwrap(), "+201012345678");
    }

    #[test]
    fn converts_arabic_indic_digits() {
        assert_eq!(normalize_phone("٠١٠١٢٣٤٥٦٧٨").unwrap(), "01012345678");
    }

    #[test]
    fn rejects_garbage_phones() {
        assert!(normalize_phone("12").is_err());
        assert!(normalize_phone("0101234abc").is_err());
        assert!(normalize_phone("010+1234567").is_err());
    }

    #[test]
    fn search_wildcards_match_literally() {
        let (pattern, phone_pattern) = search_patterns("50%_off");
        assert_eq!(pattern, "%50\\%\\_off%");
        assert_eq!(phone_pattern, pattern);
    }

    #[test]
    fn phone_search_uses_stored_form() {
        let (pattern, phone_pattern) = search_patterns("010-1234");
        assert_eq!(pattern, "%010-1234%");
        assert_eq!(phone_pattern, "%0101234%");
    }
}
