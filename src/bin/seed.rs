use holding_portal_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    services::auth_service::hash_password,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&orm_from_pool(&pool)).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin12345", "Admin", "admin").await?;
    let staff_id = ensure_user(&pool, "staff@example.com", "staff12345", "Staff", "staff").await?;
    let category_id = ensure_category(&pool, "food", "أغذية", "Food").await?;
    seed_products(&pool, category_id).await?;
    seed_globals(&pool).await?;
    seed_pages(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Staff ID: {staff_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn ensure_category(
    pool: &sqlx::PgPool,
    slug: &str,
    name_ar: &str,
    name_en: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, slug, name_ar, name_en)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (slug) DO UPDATE SET name_en = EXCLUDED.name_en
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(slug)
    .bind(name_ar)
    .bind(name_en)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool, category_id: Uuid) -> anyhow::Result<()> {
    let products = [
        ("olive-oil-1l", "زيت زيتون بكر ممتاز", "Extra Virgin Olive Oil 1L", 450_i64, Some(399_i64), 40, "foods"),
        ("dates-premium-box", "علبة تمور فاخرة", "Premium Dates Box", 320, None, 60, "foods"),
        ("basmati-rice-5kg", "أرز بسمتي 5 كجم", "Basmati Rice 5kg", 780, None, 25, "foods"),
        ("honey-sidr-500g", "عسل سدر 500 جم", "Sidr Honey 500g", 950, Some(890), 3, "foods"),
    ];

    for (slug, name_ar, name_en, price, sale_price, stock, company) in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, category_id, slug, name_ar, name_en, price, sale_price, stock, company_slug)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category_id)
        .bind(slug)
        .bind(name_ar)
        .bind(name_en)
        .bind(price)
        .bind(sale_price)
        .bind(stock)
        .bind(company)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_globals(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let docs = [
        (
            "navigation",
            json!([
                { "label_ar": "الرئيسية", "label_en": "Home", "href": "/" },
                { "label_ar": "المتجر", "label_en": "Shop", "href": "/shop" },
                { "label_ar": "شركاتنا", "label_en": "Companies", "href": "/companies" }
            ]),
        ),
        (
            "footer",
            json!({ "copyright_ar": "جميع الحقوق محفوظة", "copyright_en": "All rights reserved" }),
        ),
        ("homepage", json!({ "sections": [] })),
        ("timeline", json!([])),
    ];

    for (key, data) in docs {
        sqlx::query("INSERT INTO globals (key, data) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .bind(data)
            .execute(pool)
            .await?;
    }

    println!("Seeded globals");
    Ok(())
}

async fn seed_pages(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let pages = [
        ("privacy", "legal", "سياسة الخصوصية", "Privacy Policy"),
        ("terms", "legal", "الشروط والأحكام", "Terms and Conditions"),
    ];

    for (slug, kind, title_ar, title_en) in pages {
        sqlx::query(
            r#"
            INSERT INTO pages (id, slug, kind, title_ar, title_en, published)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(slug)
        .bind(kind)
        .bind(title_ar)
        .bind(title_en)
        .execute(pool)
        .await?;
    }

    println!("Seeded pages");
    Ok(())
}
