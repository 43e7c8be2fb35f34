use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::content::{BannerList, BannerRequest, GlobalRequest, LocalizedPage, PageRequest},
    entity::{
        banners::{self, ActiveModel as BannerActive, Column as BannerCol, Entity as Banners},
        globals::{ActiveModel as GlobalActive, Entity as Globals},
        pages::{ActiveModel as PageActive, Column as PageCol, Entity as Pages},
    },
    error::{AppError, AppResult},
    locale::Locale,
    middleware::auth::{AuthUser, ensure_dashboard},
    models::{Banner, GlobalDoc, Page, PageKind},
    response::{ApiResponse, Meta},
    routes::params::BannerQuery,
    state::AppState,
};

pub const GLOBAL_KEYS: &[&str] = &["footer", "navigation", "homepage", "timeline"];

/// Whether a banner is live at `now`: active and inside its optional scheduling window.
pub fn banner_is_live(banner: &banners::Model, now: DateTime<Utc>) -> bool {
    banner.is_active
        && banner.starts_at.is_none_or(|start| start <= now)
        && banner.ends_at.is_none_or(|end| end > now)
}

fn validate_window(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> AppResult<()> {
    match (starts_at, ends_at) {
        (Some(start), Some(end)) if end <= start => {
            Err(AppError::BadRequest("Banner must end after it starts".into()))
        }
        _ => Ok(()),
    }
}

pub async fn list_live_banners(
    state: &AppState,
    query: BannerQuery,
) -> AppResult<ApiResponse<BannerList>> {
    let mut condition = Condition::all().add(BannerCol::IsActive.eq(true));
    if let Some(placement) = query.placement.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(BannerCol::Placement.eq(placement.clone()));
    }
    // Untargeted banners show everywhere; targeted ones only on their company.
    condition = match query.company.as_ref().filter(|s| !s.is_empty()) {
        Some(company) => condition.add(
            Condition::any()
                .add(BannerCol::CompanySlug.is_null())
                .add(BannerCol::CompanySlug.eq(company.clone())),
        ),
        None => condition.add(BannerCol::CompanySlug.is_null()),
    };

    let now = Utc::now();
    let items = Banners::find()
        .filter(condition)
        .order_by_asc(BannerCol::SortOrder)
        .order_by_desc(BannerCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter(|b| banner_is_live(b, now))
        .map(Banner::from)
        .collect();

    Ok(ApiResponse::success("Banners", BannerList { items }, None))
}

pub async fn list_all_banners(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<BannerList>> {
    ensure_dashboard(user)?;
    let items = Banners::find()
        .order_by_asc(BannerCol::Placement)
        .order_by_asc(BannerCol::SortOrder)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Banner::from)
        .collect();
    Ok(ApiResponse::success("Banners", BannerList { items }, None))
}

pub async fn create_banner(
    state: &AppState,
    user: &AuthUser,
    payload: BannerRequest,
) -> AppResult<ApiResponse<Banner>> {
    ensure_dashboard(user)?;
    validate_window(payload.starts_at, payload.ends_at)?;

    let banner = BannerActive {
        id: Set(Uuid::new_v4()),
        title_ar: Set(payload.title_ar),
        title_en: Set(payload.title_en),
        subtitle_ar: Set(payload.subtitle_ar),
        subtitle_en: Set(payload.subtitle_en),
        image_url: Set(payload.image_url),
        link_url: Set(payload.link_url),
        placement: Set(payload.placement.unwrap_or_else(|| "home".into())),
        company_slug: Set(payload.company_slug),
        starts_at: Set(payload.starts_at.map(Into::into)),
        ends_at: Set(payload.ends_at.map(Into::into)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        sort_order: Set(payload.sort_order.unwrap_or(0)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "banner_create",
        "banners",
        serde_json::json!({ "banner_id": banner.id }),
    )
    .await;

    Ok(ApiResponse::success("Banner created", Banner::from(banner), Some(Meta::empty())))
}

pub async fn update_banner(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: BannerRequest,
) -> AppResult<ApiResponse<Banner>> {
    ensure_dashboard(user)?;
    validate_window(payload.starts_at, payload.ends_at)?;

    let existing = Banners::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut active: BannerActive = existing.into();
    active.title_ar = Set(payload.title_ar);
    active.title_en = Set(payload.title_en);
    active.subtitle_ar = Set(payload.subtitle_ar);
    active.subtitle_en = Set(payload.subtitle_en);
    active.image_url = Set(payload.image_url);
    active.link_url = Set(payload.link_url);
    if let Some(placement) = payload.placement {
        active.placement = Set(placement);
    }
    active.company_slug = Set(payload.company_slug);
    active.starts_at = Set(payload.starts_at.map(Into::into));
    active.ends_at = Set(payload.ends_at.map(Into::into));
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(sort_order) = payload.sort_order {
        active.sort_order = Set(sort_order);
    }
    let banner = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "banner_update",
        "banners",
        serde_json::json!({ "banner_id": banner.id }),
    )
    .await;

    Ok(ApiResponse::success("Banner updated", Banner::from(banner), Some(Meta::empty())))
}

pub async fn delete_banner(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_dashboard(user)?;
    let result = Banners::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "banner_delete",
        "banners",
        serde_json::json!({ "banner_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Deleted", serde_json::json!({}), Some(Meta::empty())))
}

pub async fn get_page(
    state: &AppState,
    slug: &str,
    locale: Locale,
) -> AppResult<ApiResponse<LocalizedPage>> {
    let page = Pages::find()
        .filter(PageCol::Slug.eq(slug))
        .filter(PageCol::Published.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let data = LocalizedPage {
        title: locale.pick(&page.title_ar, &page.title_en).to_string(),
        body: locale.pick(&page.body_ar, &page.body_en).to_string(),
        slug: page.slug,
        kind: page.kind,
        locale: locale.as_str().to_string(),
        updated_at: page.updated_at.with_timezone(&Utc),
    };
    Ok(ApiResponse::success("Page", data, None))
}

/// Create or replace the page at `slug`.
pub async fn upsert_page(
    state: &AppState,
    user: &AuthUser,
    slug: &str,
    payload: PageRequest,
) -> AppResult<ApiResponse<Page>> {
    ensure_dashboard(user)?;
    let kind = match payload.kind.as_deref() {
        Some(kind) => kind
            .parse::<PageKind>()
            .map_err(|_| AppError::BadRequest("Invalid page kind".into()))?,
        None => PageKind::Page,
    };
    if payload.title_ar.trim().is_empty() && payload.title_en.trim().is_empty() {
        return Err(AppError::BadRequest("Page title is required".into()));
    }

    let existing = Pages::find()
        .filter(PageCol::Slug.eq(slug))
        .one(&state.orm)
        .await?;

    let page = match existing {
        Some(page) => {
            let mut active: PageActive = page.into();
            active.kind = Set(kind.as_str().into());
            active.title_ar = Set(payload.title_ar);
            active.title_en = Set(payload.title_en);
            active.body_ar = Set(payload.body_ar);
            active.body_en = Set(payload.body_en);
            active.published = Set(payload.published);
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?
        }
        None => {
            PageActive {
                id: Set(Uuid::new_v4()),
                slug: Set(slug.to_string()),
                kind: Set(kind.as_str().into()),
                title_ar: Set(payload.title_ar),
                title_en: Set(payload.title_en),
                body_ar: Set(payload.body_ar),
                body_en: Set(payload.body_en),
                published: Set(payload.published),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "page_upsert",
        "pages",
        serde_json::json!({ "slug": page.slug }),
    )
    .await;

    Ok(ApiResponse::success("Page saved", Page::from(page), Some(Meta::empty())))
}

fn check_global_key(key: &str) -> AppResult<()> {
    if GLOBAL_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}

pub async fn get_global(state: &AppState, key: &str) -> AppResult<ApiResponse<GlobalDoc>> {
    check_global_key(key)?;
    let doc = Globals::find_by_id(key.to_string())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Global", GlobalDoc::from(doc), None))
}

pub async fn put_global(
    state: &AppState,
    user: &AuthUser,
    key: &str,
    payload: GlobalRequest,
) -> AppResult<ApiResponse<GlobalDoc>> {
    ensure_dashboard(user)?;
    check_global_key(key)?;
    if !payload.data.is_object() && !payload.data.is_array() {
        return Err(AppError::BadRequest("Global data must be an object or array".into()));
    }

    let existing = Globals::find_by_id(key.to_string()).one(&state.orm).await?;
    let doc = match existing {
        Some(doc) => {
            let mut active: GlobalActive = doc.into();
            active.data = Set(payload.data);
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?
        }
        None => {
            GlobalActive {
                key: Set(key.to_string()),
                data: Set(payload.data),
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "global_update",
        "globals",
        serde_json::json!({ "key": doc.key }),
    )
    .await;

    Ok(ApiResponse::success("Global saved", GlobalDoc::from(doc), Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn banner(
        is_active: bool,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> banners::Model {
        banners::Model {
            id: Uuid::new_v4(),
            title_ar: "عرض".into(),
            title_en: "Offer".into(),
            subtitle_ar: None,
            subtitle_en: None,
            image_url: "/img/offer.jpg".into(),
            link_url: None,
            placement: "home".into(),
            company_slug: None,
            starts_at: starts_at.map(Into::into),
            ends_at: ends_at.map(Into::into),
            is_active,
            sort_order: 0,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn banner_window_bounds() {
        let now = Utc::now();
        let hour = Duration::hours(1);
        assert!(banner_is_live(&banner(true, None, None), now));
        assert!(!banner_is_live(&banner(false, None, None), now));
        assert!(banner_is_live(&banner(true, Some(now - hour), Some(now + hour)), now));
        assert!(!banner_is_live(&banner(true, Some(now + hour), None), now));
        assert!(!banner_is_live(&banner(true, None, Some(now)), now));
    }

    #[test]
    fn window_must_be_ordered() {
        let now = Utc::now();
        assert!(validate_window(Some(now), Some(now)).is_err());
        assert!(validate_window(Some(now), None).is_ok());
    }

    #[test]
    fn only_known_global_keys() {
        assert!(check_global_key("footer").is_ok());
        assert!(matches!(check_global_key("secrets"), Err(AppError::NotFound)));
    }
}
