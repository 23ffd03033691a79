use rust_decimal::Decimal;
use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    let apparel = ensure_collection(&pool, "Apparel").await?;
    let kitchen = ensure_collection(&pool, "Kitchen").await?;
    let stationery = ensure_collection(&pool, "Stationery").await?;

    let products = [
        ("Axum Hoodie", "axum-hoodie", "Warm hoodie for Rustaceans", 5500, 50, apparel),
        ("Ferris Mug", "ferris-mug", "Coffee tastes better with Ferris", 1200, 100, kitchen),
        ("Rust Sticker Pack", "rust-sticker-pack", "Decorate your laptop", 500, 200, stationery),
        ("Borrow Checker Notebook", "borrow-checker-notebook", "Lined pages, no aliasing", 899, 6, stationery),
    ];

    for (title, slug, description, cents, inventory, collection_id) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, title, slug, description, unit_price, inventory, collection_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(slug)
        .bind(description)
        .bind(Decimal::new(cents, 2))
        .bind(inventory)
        .bind(collection_id)
        .execute(&pool)
        .await?;
    }

    println!("Seed completed");
    Ok(())
}

async fn ensure_collection(pool: &sqlx::PgPool, title: &str) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM collections WHERE title = $1")
        .bind(title)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) =
        sqlx::query_as("INSERT INTO collections (id, title) VALUES ($1, $2) RETURNING id")
            .bind(Uuid::new_v4())
            .bind(title)
            .fetch_one(pool)
            .await?;
    println!("Ensured collection {title}");
    Ok(id)
}
