use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit_best_effort,
    dto::orders::{CreateOrderRequest, OrderList, UpdateOrderRequest},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems, Model as CartItemModel},
        carts::{Column as CartCol, Entity as Carts},
        customers::{Column as CustomerCol, Entity as Customers},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, PaymentStatus, SimpleProduct},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::customer_service::resolve_customer,
    state::AppState,
};

/// One order line copied from a cart item at placement time.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSnapshot {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Copy product, quantity and the product's current price out of each cart line.
pub fn snapshot_lines(rows: &[(CartItemModel, ProductModel)]) -> Vec<LineSnapshot> {
    rows.iter()
        .map(|(item, product)| LineSnapshot {
            product_id: product.id,
            quantity: item.quantity,
            unit_price: product.unit_price,
        })
        .collect()
}

pub fn order_total(items: &[OrderItem]) -> Decimal {
    items
        .iter()
        .map(|item| Decimal::from(item.quantity) * item.unit_price)
        .sum()
}

/// Convert a cart into an order in one transaction, then notify observers.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let cart_id = payload.cart_id;

    if Carts::find_by_id(cart_id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let item_count = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .count(&state.orm)
        .await?;
    if item_count == 0 {
        return Err(AppError::EmptyCart);
    }

    let customer = resolve_customer(&state.orm, user.user_id).await?;

    let order = match write_order(state, cart_id, customer.id).await {
        Ok(order) => order,
        Err(PlacementError::App(err)) => return Err(err),
        Err(PlacementError::Db(err)) => {
            tracing::error!(%cart_id, error = %err, "order placement rolled back");
            return Err(AppError::TransactionAborted(err));
        }
    };

    tracing::info!(
        order_id = %order.id,
        %cart_id,
        customer_id = %order.customer_id,
        items = order.items.len(),
        "order placed"
    );

    let delivered = state.notifier.notify_order_created(&order).await;
    tracing::debug!(order_id = %order.id, delivered, "order_created dispatched");

    Ok(ApiResponse::success("Order created", order, Some(Meta::empty())))
}

enum PlacementError {
    App(AppError),
    Db(sea_orm::DbErr),
}

impl From<sea_orm::DbErr> for PlacementError {
    fn from(err: sea_orm::DbErr) -> Self {
        PlacementError::Db(err)
    }
}

/// Transactional part of placement. Dropping `txn` on any early return rolls
/// everything back, leaving the cart untouched.
async fn write_order(
    state: &AppState,
    cart_id: Uuid,
    customer_id: Uuid,
) -> Result<Order, PlacementError> {
    let txn = state.orm.begin().await?;

    // Serialises concurrent placements of the same cart.
    let locked = Carts::find()
        .filter(CartCol::Id.eq(cart_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    if locked.is_none() {
        return Err(PlacementError::App(AppError::NotFound));
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        placed_at: NotSet,
        payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
    }
    .insert(&txn)
    .await?;

    let rows: Vec<(CartItemModel, ProductModel)> = CartItems::find()
        .find_also_related(Products)
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| (item, p)))
        .collect();
    if rows.is_empty() {
        return Err(PlacementError::App(AppError::EmptyCart));
    }

    let lines = snapshot_lines(&rows);
    let actives: Vec<OrderItemActive> = lines
        .iter()
        .map(|line| OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            created_at: NotSet,
        })
        .collect();
    OrderItems::insert_many(actives)
        .exec_without_returning(&txn)
        .await?;

    Carts::delete_by_id(cart_id).exec(&txn).await?;

    let order = load_order(&txn, order).await?;
    txn.commit().await?;

    Ok(order)
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if !user.is_admin() {
        match customer_id_for(state, user).await? {
            Some(customer_id) => condition = condition.add(OrderCol::CustomerId.eq(customer_id)),
            None => {
                return Ok(ApiResponse::success(
                    "Ok",
                    OrderList { items: Vec::new() },
                    Some(Meta::new(page, limit, 0)),
                ));
            }
        }
    }
    if let Some(status) = query.payment_status {
        condition = condition.add(OrderCol::PaymentStatus.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::PlacedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::PlacedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let orders = load_orders(&state.orm, models).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if !user.is_admin() {
        let customer_id = customer_id_for(state, user)
            .await?
            .ok_or(AppError::NotFound)?;
        condition = condition.add(OrderCol::CustomerId.eq(customer_id));
    }

    let order = Orders::find()
        .filter(condition)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let order = load_order(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: OrderActive = existing.into();
    active.payment_status = Set(payload.payment_status.as_str().to_string());
    let order = active.update(&state.orm).await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "order_payment_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "payment_status": order.payment_status })),
    )
    .await;

    let order = load_order(&state.orm, order).await?;
    Ok(ApiResponse::success("Order updated", order, Some(Meta::empty())))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn customer_id_for(state: &AppState, user: &AuthUser) -> AppResult<Option<Uuid>> {
    let customer = Customers::find()
        .filter(CustomerCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    Ok(customer.map(|c| c.id))
}

async fn load_order<C: ConnectionTrait>(conn: &C, model: OrderModel) -> Result<Order, sea_orm::DbErr> {
    let mut orders = load_orders(conn, vec![model]).await?;
    orders
        .pop()
        .ok_or_else(|| sea_orm::DbErr::Custom("order vanished while loading".into()))
}

async fn load_orders<C: ConnectionTrait>(
    conn: &C,
    models: Vec<OrderModel>,
) -> Result<Vec<Order>, sea_orm::DbErr> {
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = models.iter().map(|o| o.id).collect();
    let rows = OrderItems::find()
        .find_also_related(Products)
        .filter(OrderItemCol::OrderId.is_in(ids))
        // Lines written by one placement share `created_at`.
        .order_by_asc(OrderItemCol::CreatedAt)
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?;

    let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for (item, product) in rows {
        let Some(product) = product else { continue };
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderItem {
                id: item.id,
                product: SimpleProduct {
                    id: product.id,
                    title: product.title,
                    unit_price: product.unit_price,
                },
                unit_price: item.unit_price,
                quantity: item.quantity,
            });
    }

    Ok(models
        .into_iter()
        .map(|model| {
            let items = items_by_order.remove(&model.id).unwrap_or_default();
            order_from_entity(model, items)
        })
        .collect())
}

fn order_from_entity(model: OrderModel, items: Vec<OrderItem>) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        placed_at: model.placed_at.with_timezone(&Utc),
        // Rows are only written through `PaymentStatus::as_str`.
        payment_status: PaymentStatus::parse(&model.payment_status)
            .unwrap_or(PaymentStatus::Pending),
        total_price: order_total(&items),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
        Utc::now().with_timezone(&FixedOffset::east_opt(0).unwrap())
    }

    fn product(cents: i64) -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            title: "Widget".into(),
            slug: format!("widget-{}", Uuid::new_v4()),
            description: None,
            unit_price: Decimal::new(cents, 2),
            inventory: 10,
            collection_id: Uuid::new_v4(),
            last_update: now(),
            created_at: now(),
        }
    }

    fn cart_item(product: &ProductModel, quantity: i32) -> CartItemModel {
        CartItemModel {
            id: Uuid::new_v4(),
            cart_id: Uuid::nil(),
            product_id: product.id,
            quantity,
            created_at: now(),
        }
    }

    #[test]
    fn snapshots_copy_quantity_and_current_price() {
        let a = product(1000);
        let b = product(500);
        let rows = vec![(cart_item(&a, 2), a.clone()), (cart_item(&b, 1), b.clone())];

        let lines = snapshot_lines(&rows);

        assert_eq!(
            lines,
            vec![
                LineSnapshot {
                    product_id: a.id,
                    quantity: 2,
                    unit_price: Decimal::new(1000, 2),
                },
                LineSnapshot {
                    product_id: b.id,
                    quantity: 1,
                    unit_price: Decimal::new(500, 2),
                },
            ]
        );
    }

    #[test]
    fn total_uses_snapshot_price_not_current_price() {
        let item = OrderItem {
            id: Uuid::new_v4(),
            product: SimpleProduct {
                id: Uuid::new_v4(),
                title: "Widget".into(),
                // price has since gone up
                unit_price: Decimal::new(9900, 2),
            },
            unit_price: Decimal::new(1000, 2),
            quantity: 3,
        };
        assert_eq!(order_total(&[item]), Decimal::new(3000, 2));
    }
}
