mod common;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use storefront_api::{
    dto::orders::CreateOrderRequest,
    entity::{
        audit_logs::{Column as AuditCol, Entity as AuditLogs},
        cart_items::{Column as CartItemCol, Entity as CartItems},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::AppError,
    models::{Order, PaymentStatus},
    notifications::{OrderNotifier, OrderObserver},
    services::{cart_service, customer_service, order_service},
    state::AppState,
};

use common::{customer, seed_cart, seed_collection, seed_product, setup_state};

#[tokio::test]
async fn placing_an_order_converts_the_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let a = seed_product(&state, collection_id, 1000, 20).await?;
    let b = seed_product(&state, collection_id, 500, 20).await?;
    let cart_id = seed_cart(&state, &[(a.id, 2), (b.id, 1)]).await?;
    let user = customer();

    let order = order_service::place_order(&state, &user, CreateOrderRequest { cart_id })
        .await?
        .data
        .expect("order");

    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total_price, Decimal::new(2500, 2));

    let line_a = order.items.iter().find(|i| i.product.id == a.id).expect("line a");
    assert_eq!(line_a.quantity, 2);
    assert_eq!(line_a.unit_price, Decimal::new(1000, 2));
    let line_b = order.items.iter().find(|i| i.product.id == b.id).expect("line b");
    assert_eq!(line_b.quantity, 1);
    assert_eq!(line_b.unit_price, Decimal::new(500, 2));

    // Lines share one insert timestamp; the listing falls back to id order.
    let reloaded = order_service::get_order(&state, &user, order.id)
        .await?
        .data
        .expect("order");
    let ids: Vec<_> = reloaded.items.iter().map(|i| i.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(
        order.items.iter().map(|i| i.id).collect::<Vec<_>>(),
        ids
    );

    let profile = customer_service::resolve_customer(&state.orm, user.user_id).await?;
    assert_eq!(order.customer_id, profile.id);

    assert!(matches!(
        cart_service::get_cart(&state, cart_id).await,
        Err(AppError::NotFound)
    ));
    let leftover = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .count(&state.orm)
        .await?;
    assert_eq!(leftover, 0);

    Ok(())
}

#[tokio::test]
async fn order_keeps_the_price_paid_after_a_price_change() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let product = seed_product(&state, collection_id, 1000, 20).await?;
    let cart_id = seed_cart(&state, &[(product.id, 3)]).await?;
    let user = customer();

    let placed = order_service::place_order(&state, &user, CreateOrderRequest { cart_id })
        .await?
        .data
        .expect("order");

    sqlx::query("UPDATE products SET unit_price = $1 WHERE id = $2")
        .bind(Decimal::new(9900, 2))
        .bind(product.id)
        .execute(&state.pool)
        .await?;

    let reloaded = order_service::get_order(&state, &user, placed.id)
        .await?
        .data
        .expect("order");
    assert_eq!(reloaded.items[0].unit_price, Decimal::new(1000, 2));
    assert_eq!(reloaded.items[0].product.unit_price, Decimal::new(9900, 2));
    assert_eq!(reloaded.total_price, Decimal::new(3000, 2));

    Ok(())
}

#[tokio::test]
async fn unknown_cart_is_not_found() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let user = customer();

    let result = order_service::place_order(
        &state,
        &user,
        CreateOrderRequest {
            cart_id: uuid::Uuid::new_v4(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound)));

    Ok(())
}

#[tokio::test]
async fn empty_cart_is_rejected_and_left_in_place() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let cart_id = seed_cart(&state, &[]).await?;
    let user = customer();

    let result = order_service::place_order(&state, &user, CreateOrderRequest { cart_id }).await;
    assert!(matches!(result, Err(AppError::EmptyCart)));
    assert!(cart_service::get_cart(&state, cart_id).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn failed_item_insert_rolls_back_the_whole_order() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };

    // Any order line with this quantity is rejected by the database.
    const POISON_QUANTITY: i32 = 4242;
    state
        .orm
        .execute_unprepared(
            r#"CREATE OR REPLACE FUNCTION reject_poison_order_items() RETURNS trigger AS $$
            BEGIN
                IF NEW.quantity = 4242 THEN
                    RAISE EXCEPTION 'order item rejected';
                END IF;
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql"#,
        )
        .await?;
    state
        .orm
        .execute_unprepared("DROP TRIGGER IF EXISTS reject_poison_order_items ON order_items")
        .await?;
    state
        .orm
        .execute_unprepared(
            "CREATE TRIGGER reject_poison_order_items BEFORE INSERT ON order_items \
             FOR EACH ROW EXECUTE FUNCTION reject_poison_order_items()",
        )
        .await?;

    let collection_id = seed_collection(&state).await?;
    let good = seed_product(&state, collection_id, 1000, 20).await?;
    let poisoned = seed_product(&state, collection_id, 500, 20).await?;
    let cart_id = seed_cart(&state, &[(good.id, 1), (poisoned.id, POISON_QUANTITY)]).await?;
    let user = customer();
    let profile = customer_service::resolve_customer(&state.orm, user.user_id).await?;

    let result = order_service::place_order(&state, &user, CreateOrderRequest { cart_id }).await;

    state
        .orm
        .execute_unprepared("DROP TRIGGER IF EXISTS reject_poison_order_items ON order_items")
        .await?;
    state
        .orm
        .execute_unprepared("DROP FUNCTION IF EXISTS reject_poison_order_items()")
        .await?;

    assert!(matches!(result, Err(AppError::TransactionAborted(_))));

    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(profile.id))
        .count(&state.orm)
        .await?;
    assert_eq!(orders, 0);

    let cart = cart_service::get_cart(&state, cart_id)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 2);

    Ok(())
}

#[tokio::test]
async fn concurrent_placements_of_one_cart_produce_one_order() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let product = seed_product(&state, collection_id, 1000, 20).await?;
    let cart_id = seed_cart(&state, &[(product.id, 1)]).await?;
    let user = customer();
    let profile = customer_service::resolve_customer(&state.orm, user.user_id).await?;

    let (first, second) = tokio::join!(
        order_service::place_order(&state, &user, CreateOrderRequest { cart_id }),
        order_service::place_order(&state, &user, CreateOrderRequest { cart_id }),
    );
    let placed = [first.is_ok(), second.is_ok()]
        .into_iter()
        .filter(|ok| *ok)
        .count();
    assert_eq!(placed, 1);

    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(profile.id))
        .count(&state.orm)
        .await?;
    assert_eq!(orders, 1);

    Ok(())
}

struct Counting(Arc<AtomicUsize>);

#[async_trait]
impl OrderObserver for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn order_created(&self, _order: &Order) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl OrderObserver for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn order_created(&self, _order: &Order) -> anyhow::Result<()> {
        anyhow::bail!("mail server unavailable")
    }
}

struct Panicking;

#[async_trait]
impl OrderObserver for Panicking {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn order_created(&self, _order: &Order) -> anyhow::Result<()> {
        panic!("observer bug")
    }
}

#[tokio::test]
async fn broken_observers_do_not_fail_placement() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let notifier = OrderNotifier::new()
        .register(Failing)
        .register(Panicking)
        .register(Counting(Arc::clone(&calls)));
    let Some(state) = setup_state(notifier).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let product = seed_product(&state, collection_id, 1000, 20).await?;
    let cart_id = seed_cart(&state, &[(product.id, 1)]).await?;
    let user = customer();

    let order = order_service::place_order(&state, &user, CreateOrderRequest { cart_id })
        .await?
        .data
        .expect("order");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stored = order_service::get_order(&state, &user, order.id).await?;
    assert_eq!(stored.data.expect("order").id, order.id);

    Ok(())
}

#[tokio::test]
async fn default_observers_record_the_order_in_the_audit_log() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let state = AppState {
        notifier: OrderNotifier::with_defaults(state.pool.clone()),
        ..state
    };
    let collection_id = seed_collection(&state).await?;
    let product = seed_product(&state, collection_id, 1000, 20).await?;
    let cart_id = seed_cart(&state, &[(product.id, 2)]).await?;

    let order = order_service::place_order(&state, &customer(), CreateOrderRequest { cart_id })
        .await?
        .data
        .expect("order");

    let entries = AuditLogs::find()
        .filter(AuditCol::Action.eq("order_created"))
        .order_by_desc(AuditCol::CreatedAt)
        .limit(100)
        .all(&state.orm)
        .await?;
    let order_id = order.id.to_string();
    assert!(entries.iter().any(|entry| {
        entry
            .metadata
            .as_ref()
            .and_then(|m| m.get("order_id"))
            .and_then(|v| v.as_str())
            == Some(order_id.as_str())
    }));

    Ok(())
}
