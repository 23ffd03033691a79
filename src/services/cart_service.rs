use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit_best_effort,
    dto::cart::{AddCartItemRequest, CartItemList, UpdateCartItemRequest},
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems, Model as CartItemModel},
        carts::{ActiveModel as CartActive, Entity as Carts},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    models::{Cart, CartItem, SimpleProduct},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_cart(state: &AppState) -> AppResult<ApiResponse<Cart>> {
    let cart = CartActive {
        id: Set(Uuid::new_v4()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Cart created",
        Cart {
            id: cart.id,
            items: Vec::new(),
            total_price: Decimal::ZERO,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_cart(state: &AppState, cart_id: Uuid) -> AppResult<ApiResponse<Cart>> {
    ensure_cart_exists(state, cart_id).await?;
    let items = load_items(&state.orm, cart_id).await?;
    let total_price = cart_total(&items);

    Ok(ApiResponse::success(
        "Cart",
        Cart {
            id: cart_id,
            items,
            total_price,
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_cart(
    state: &AppState,
    cart_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Carts::delete_by_id(cart_id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Cart deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_items(state: &AppState, cart_id: Uuid) -> AppResult<ApiResponse<CartItemList>> {
    ensure_cart_exists(state, cart_id).await?;
    let items = load_items(&state.orm, cart_id).await?;
    Ok(ApiResponse::success(
        "OK",
        CartItemList { items },
        Some(Meta::empty()),
    ))
}

pub async fn add_item(
    state: &AppState,
    cart_id: Uuid,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    validate_quantity(payload.quantity)?;
    ensure_cart_exists(state, cart_id).await?;

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("No product with the given id".into()))?;

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartItemCol::CartId.eq(cart_id))
                .add(CartItemCol::ProductId.eq(payload.product_id)),
        )
        .one(&state.orm)
        .await?;

    let item = match existing {
        Some(item) => {
            let quantity = item.quantity.checked_add(payload.quantity).ok_or_else(|| {
                AppError::BadRequest("quantity is too large".into())
            })?;
            let mut active: CartItemActive = item.into();
            active.quantity = Set(quantity);
            active.update(&state.orm).await?
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_id: Set(payload.product_id),
                quantity: Set(payload.quantity),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    log_audit_best_effort(
        &state.pool,
        None,
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({
            "cart_id": cart_id,
            "product_id": payload.product_id,
            "quantity": item.quantity,
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "OK",
        cart_item_from_entity(item, product),
        Some(Meta::empty()),
    ))
}

pub async fn update_item(
    state: &AppState,
    cart_id: Uuid,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    validate_quantity(payload.quantity)?;

    let (item, product) = CartItems::find()
        .find_also_related(Products)
        .filter(
            Condition::all()
                .add(CartItemCol::Id.eq(item_id))
                .add(CartItemCol::CartId.eq(cart_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = product.ok_or(AppError::NotFound)?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    let item = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        cart_item_from_entity(item, product),
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    cart_id: Uuid,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(CartItemCol::Id.eq(item_id))
        .filter(CartItemCol::CartId.eq(cart_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn ensure_cart_exists(state: &AppState, cart_id: Uuid) -> AppResult<()> {
    Carts::find_by_id(cart_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(())
}

async fn load_items<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<Vec<CartItem>> {
    let rows = CartItems::find()
        .find_also_related(Products)
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| cart_item_from_entity(item, p)))
        .collect())
}

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Line total at the product's current price.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

fn cart_total(items: &[CartItem]) -> Decimal {
    items.iter().map(|item| item.total_price).sum()
}

fn cart_item_from_entity(item: CartItemModel, product: ProductModel) -> CartItem {
    CartItem {
        id: item.id,
        total_price: line_total(item.quantity, product.unit_price),
        quantity: item.quantity,
        product: SimpleProduct {
            id: product.id,
            title: product.title,
            unit_price: product.unit_price,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32, cents: i64) -> CartItem {
        let unit_price = Decimal::new(cents, 2);
        CartItem {
            id: Uuid::new_v4(),
            product: SimpleProduct {
                id: Uuid::new_v4(),
                title: "p".into(),
                unit_price,
            },
            quantity,
            total_price: line_total(quantity, unit_price),
        }
    }

    #[test]
    fn cart_total_sums_line_totals() {
        let items = vec![item(2, 1000), item(1, 500)];
        assert_eq!(cart_total(&items), Decimal::new(2500, 2));
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1).is_ok());
    }
}
