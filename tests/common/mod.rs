#![allow(dead_code)]

use rust_decimal::Decimal;
use storefront_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::{cart::AddCartItemRequest, collections::CollectionRequest, products::CreateProductRequest},
    middleware::auth::{ADMIN_ROLE, AuthUser},
    models::Product,
    notifications::OrderNotifier,
    services::{cart_service, collection_service, product_service},
    state::AppState,
};
use tokio::sync::OnceCell;
use uuid::Uuid;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// State backed by the test database, or `None` when no database is configured.
pub async fn setup_state(notifier: OrderNotifier) -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run database tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 5).await?;
    let orm = orm_from_pool(&pool);
    MIGRATED
        .get_or_try_init(|| async { run_migrations(&pool).await })
        .await?;

    Ok(Some(AppState { pool, orm, notifier }))
}

pub fn customer() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: ADMIN_ROLE.into(),
    }
}

pub async fn seed_collection(state: &AppState) -> anyhow::Result<Uuid> {
    let resp = collection_service::create_collection(
        state,
        &admin(),
        CollectionRequest {
            title: format!("Collection {}", Uuid::new_v4()),
        },
    )
    .await?;
    Ok(resp.data.expect("collection").id)
}

pub async fn seed_product(
    state: &AppState,
    collection_id: Uuid,
    cents: i64,
    inventory: i32,
) -> anyhow::Result<Product> {
    let slug = format!("product-{}", Uuid::new_v4());
    let resp = product_service::create_product(
        state,
        &admin(),
        CreateProductRequest {
            title: slug.clone(),
            slug,
            description: None,
            unit_price: Decimal::new(cents, 2),
            inventory,
            collection_id,
        },
    )
    .await?;
    Ok(resp.data.expect("product"))
}

pub async fn seed_cart(state: &AppState, lines: &[(Uuid, i32)]) -> anyhow::Result<Uuid> {
    let cart_id = cart_service::create_cart(state)
        .await?
        .data
        .expect("cart")
        .id;
    for &(product_id, quantity) in lines {
        cart_service::add_item(
            state,
            cart_id,
            AddCartItemRequest {
                product_id,
                quantity,
            },
        )
        .await?;
    }
    Ok(cart_id)
}
