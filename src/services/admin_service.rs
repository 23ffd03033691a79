use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    audit::log_audit_best_effort,
    dto::products::{ClearInventoryRequest, ClearInventoryResult, InventoryProduct, InventoryProductList},
    entity::{
        collections::Entity as Collections,
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::LowInventoryQuery,
    state::AppState,
};

/// Default cut-off for the low-inventory listing; stock above it reads as "Ok".
pub const LOW_INVENTORY_THRESHOLD: i32 = 10;

pub fn inventory_status(inventory: i32) -> &'static str {
    if inventory > LOW_INVENTORY_THRESHOLD {
        "Ok"
    } else {
        "Low"
    }
}

pub async fn list_low_inventory(
    state: &AppState,
    user: &AuthUser,
    query: LowInventoryQuery,
) -> AppResult<ApiResponse<InventoryProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(LOW_INVENTORY_THRESHOLD);
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::Inventory.lt(threshold))
        .order_by_asc(ProdCol::Inventory)
        .order_by_asc(ProdCol::Title);

    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .find_also_related(Collections)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .map(|(product, collection)| InventoryProduct {
            id: product.id,
            title: product.title,
            unit_price: product.unit_price,
            inventory: product.inventory,
            inventory_status: inventory_status(product.inventory).to_string(),
            collection_title: collection.map(|c| c.title).unwrap_or_default(),
        })
        .collect();

    Ok(ApiResponse::success(
        "Low inventory",
        InventoryProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn clear_inventory(
    state: &AppState,
    user: &AuthUser,
    payload: ClearInventoryRequest,
) -> AppResult<ApiResponse<ClearInventoryResult>> {
    ensure_admin(user)?;
    if payload.product_ids.is_empty() {
        return Err(AppError::BadRequest("product_ids must not be empty".into()));
    }

    let result = Products::update_many()
        .col_expr(ProdCol::Inventory, Expr::value(0))
        .col_expr(ProdCol::LastUpdate, Expr::value(Utc::now()))
        .filter(ProdCol::Id.is_in(payload.product_ids.clone()))
        .exec(&state.orm)
        .await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "inventory_clear",
        Some("products"),
        Some(serde_json::json!({
            "product_ids": payload.product_ids,
            "updated": result.rows_affected,
        })),
    )
    .await;

    Ok(ApiResponse::success(
        format!("{} products were successfully updated", result.rows_affected),
        ClearInventoryResult {
            updated: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}
