mod common;

use rust_decimal::Decimal;
use storefront_api::{
    dto::{
        cart::{AddCartItemRequest, UpdateCartItemRequest},
        collections::CollectionRequest,
        orders::{CreateOrderRequest, UpdateOrderRequest},
        products::{ClearInventoryRequest, CreateProductRequest, UpdateProductRequest},
    },
    error::AppError,
    models::PaymentStatus,
    response::Meta,
    notifications::OrderNotifier,
    routes::params::{LowInventoryQuery, OrderListQuery},
    services::{admin_service, cart_service, collection_service, order_service, product_service},
};

use common::{admin, customer, seed_cart, seed_collection, seed_product, setup_state};

#[tokio::test]
async fn adding_a_product_twice_merges_the_cart_line() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let product = seed_product(&state, collection_id, 250, 20).await?;
    let cart_id = seed_cart(&state, &[(product.id, 2)]).await?;

    let merged = cart_service::add_item(
        &state,
        cart_id,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await?
    .data
    .expect("item");
    assert_eq!(merged.quantity, 5);

    let updated = cart_service::update_item(
        &state,
        cart_id,
        merged.id,
        UpdateCartItemRequest { quantity: 4 },
    )
    .await?
    .data
    .expect("item");
    assert_eq!(updated.total_price, Decimal::new(1000, 2));

    let cart = cart_service::get_cart(&state, cart_id).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_price, Decimal::new(1000, 2));

    let unknown = cart_service::add_item(
        &state,
        cart_id,
        AddCartItemRequest {
            product_id: uuid::Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await;
    assert!(matches!(unknown, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn catalog_deletes_are_blocked_while_referenced() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let product = seed_product(&state, collection_id, 1000, 20).await?;
    let cart_id = seed_cart(&state, &[(product.id, 1)]).await?;
    order_service::place_order(&state, &customer(), CreateOrderRequest { cart_id }).await?;

    let result = collection_service::delete_collection(&state, &admin(), collection_id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let result = product_service::delete_product(&state, &admin(), product.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn out_of_range_price_is_a_bad_request() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;

    let result = product_service::create_product(
        &state,
        &admin(),
        CreateProductRequest {
            title: "Too expensive".into(),
            slug: format!("too-expensive-{}", uuid::Uuid::new_v4()),
            description: None,
            unit_price: Decimal::new(100_000_000, 2),
            inventory: 1,
            collection_id,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let product = seed_product(&state, collection_id, 1000, 1).await?;
    let result = product_service::update_product(
        &state,
        &admin(),
        product.id,
        UpdateProductRequest {
            unit_price: Some(Decimal::new(100_000_000, 2)),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn catalog_writes_require_admin() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };

    let result = collection_service::create_collection(
        &state,
        &customer(),
        CollectionRequest {
            title: "Not allowed".into(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    Ok(())
}

#[tokio::test]
async fn customers_only_see_their_own_orders() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let product = seed_product(&state, collection_id, 1000, 20).await?;
    let owner = customer();
    let stranger = customer();

    let cart_id = seed_cart(&state, &[(product.id, 1)]).await?;
    let order = order_service::place_order(&state, &owner, CreateOrderRequest { cart_id })
        .await?
        .data
        .expect("order");

    let mine = order_service::list_orders(&state, &owner, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert_eq!(mine.items.len(), 1);

    let theirs = order_service::list_orders(&state, &stranger, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert!(theirs.items.is_empty());
    assert!(matches!(
        order_service::get_order(&state, &stranger, order.id).await,
        Err(AppError::NotFound)
    ));

    let forbidden = order_service::update_order(
        &state,
        &owner,
        order.id,
        UpdateOrderRequest {
            payment_status: PaymentStatus::Complete,
        },
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let paid = order_service::update_order(
        &state,
        &admin(),
        order.id,
        UpdateOrderRequest {
            payment_status: PaymentStatus::Complete,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(paid.payment_status, PaymentStatus::Complete);

    Ok(())
}

#[tokio::test]
async fn admin_can_list_and_clear_low_inventory() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };
    let collection_id = seed_collection(&state).await?;
    let scarce = seed_product(&state, collection_id, 1000, 3).await?;

    let listing = admin_service::list_low_inventory(
        &state,
        &admin(),
        LowInventoryQuery {
            threshold: Some(5),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("inventory");
    assert!(listing.items.iter().all(|p| p.inventory < 5));
    assert!(listing.items.iter().all(|p| p.inventory_status == "Low"));

    let cleared = admin_service::clear_inventory(
        &state,
        &admin(),
        ClearInventoryRequest {
            product_ids: vec![scarce.id],
        },
    )
    .await?;
    assert_eq!(cleared.message, "1 products were successfully updated");

    let resp = product_service::get_product(&state, scarce.id).await?;
    assert_eq!(resp.meta, Some(Meta::empty()));
    let product = resp.data.expect("product");
    assert_eq!(product.inventory, 0);

    Ok(())
}
