use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit_best_effort,
    dto::products::{AddImageRequest, CreateProductRequest, ImageList, ProductList, UpdateProductRequest},
    entity::{
        collections::Entity as Collections,
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        product_images::{
            ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages,
            Model as ImageModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, ProductImage},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

/// Multiplier applied to `unit_price` for the displayed tax-inclusive price.
pub const TAX_RATE: Decimal = Decimal::from_parts(11, 0, 0, false, 1);

/// Largest value a `NUMERIC(8, 2)` price column holds.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

pub fn price_with_tax(unit_price: Decimal) -> Decimal {
    (unit_price * TAX_RATE).round_dp(2)
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(collection_id) = query.collection_id {
        condition = condition.add(Column::CollectionId.eq(collection_id));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::UnitPrice.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::UnitPrice.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::Title);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Asc);
    let sort_col = match sort_by {
        ProductSortBy::UnitPrice => Column::UnitPrice,
        ProductSortBy::LastUpdate => Column::LastUpdate,
        ProductSortBy::Title => Column::Title,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = models.iter().map(|p| p.id).collect();
    let mut images = images_by_product(&state.orm, ids).await?;
    let items = models
        .into_iter()
        .map(|model| {
            let product_images = images.remove(&model.id).unwrap_or_default();
            product_from_entity(model, product_images)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = find_product(state, id).await?;
    let images = images_by_product(&state.orm, vec![id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(ApiResponse::success(
        "Product",
        product_from_entity(model, images),
        Some(Meta::empty()),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let title = non_blank("title", &payload.title)?;
    let slug = non_blank("slug", &payload.slug)?;
    validate_price(payload.unit_price)?;
    validate_inventory(payload.inventory)?;
    ensure_collection_exists(state, payload.collection_id).await?;
    ensure_slug_free(state, &slug, None).await?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        slug: Set(slug),
        description: Set(payload.description),
        unit_price: Set(payload.unit_price),
        inventory: Set(payload.inventory),
        collection_id: Set(payload.collection_id),
        last_update: NotSet,
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product, Vec::new()),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = find_product(state, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(non_blank("title", &title)?);
    }
    if let Some(slug) = payload.slug {
        let slug = non_blank("slug", &slug)?;
        ensure_slug_free(state, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(unit_price) = payload.unit_price {
        validate_price(unit_price)?;
        active.unit_price = Set(unit_price);
    }
    if let Some(inventory) = payload.inventory {
        validate_inventory(inventory)?;
        active.inventory = Set(inventory);
    }
    if let Some(collection_id) = payload.collection_id {
        ensure_collection_exists(state, collection_id).await?;
        active.collection_id = Set(collection_id);
    }
    active.last_update = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    let images = images_by_product(&state.orm, vec![id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product, images),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    find_product(state, id).await?;

    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "Product cannot be deleted because it is associated with an order item".into(),
        ));
    }

    Products::delete_by_id(id).exec(&state.orm).await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_images(state: &AppState, product_id: Uuid) -> AppResult<ApiResponse<ImageList>> {
    find_product(state, product_id).await?;
    let items = images_by_product(&state.orm, vec![product_id])
        .await?
        .remove(&product_id)
        .unwrap_or_default();
    Ok(ApiResponse::success("Images", ImageList { items }, Some(Meta::empty())))
}

pub async fn add_image(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: AddImageRequest,
) -> AppResult<ApiResponse<ProductImage>> {
    ensure_admin(user)?;
    find_product(state, product_id).await?;
    let image = non_blank("image", &payload.image)?;

    let model = ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        image: Set(image),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Image added",
        image_from_entity(model),
        Some(Meta::empty()),
    ))
}

pub async fn delete_image(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    image_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = ProductImages::delete_many()
        .filter(ImageCol::Id.eq(image_id))
        .filter(ImageCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub(crate) async fn find_product(state: &AppState, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn images_by_product<C: ConnectionTrait>(
    conn: &C,
    product_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<ProductImage>>> {
    let mut grouped: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(grouped);
    }

    let images = ProductImages::find()
        .filter(ImageCol::ProductId.is_in(product_ids))
        .order_by_asc(ImageCol::CreatedAt)
        .all(conn)
        .await?;
    for image in images {
        grouped
            .entry(image.product_id)
            .or_default()
            .push(image_from_entity(image));
    }
    Ok(grouped)
}

async fn ensure_collection_exists(state: &AppState, collection_id: Uuid) -> AppResult<()> {
    let exists = Collections::find_by_id(collection_id)
        .one(&state.orm)
        .await?
        .is_some();
    if !exists {
        return Err(AppError::BadRequest("collection not found".into()));
    }
    Ok(())
}

async fn ensure_slug_free(state: &AppState, slug: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut finder = Products::find().filter(Column::Slug.eq(slug));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.count(&state.orm).await? > 0 {
        return Err(AppError::BadRequest(format!("slug '{slug}' is already in use")));
    }
    Ok(())
}

fn non_blank(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be blank")));
    }
    Ok(value.to_string())
}

fn validate_price(unit_price: Decimal) -> AppResult<()> {
    if unit_price < Decimal::ONE {
        return Err(AppError::BadRequest("unit_price must be at least 1".into()));
    }
    if unit_price > MAX_UNIT_PRICE {
        return Err(AppError::BadRequest(format!(
            "unit_price must not exceed {MAX_UNIT_PRICE}"
        )));
    }
    if unit_price.normalize().scale() > 2 {
        return Err(AppError::BadRequest(
            "unit_price must have at most 2 decimal places".into(),
        ));
    }
    Ok(())
}

fn validate_inventory(inventory: i32) -> AppResult<()> {
    if inventory < 0 {
        return Err(AppError::BadRequest("inventory cannot be negative".into()));
    }
    Ok(())
}

fn image_from_entity(model: ImageModel) -> ProductImage {
    ProductImage {
        id: model.id,
        product_id: model.product_id,
        image: model.image,
    }
}

fn product_from_entity(model: ProductModel, images: Vec<ProductImage>) -> Product {
    Product {
        id: model.id,
        title: model.title,
        slug: model.slug,
        description: model.description,
        inventory: model.inventory,
        unit_price: model.unit_price,
        price_with_tax: price_with_tax(model.unit_price),
        collection_id: model.collection_id,
        images,
        last_update: model.last_update.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_is_ten_percent_rounded_to_cents() {
        assert_eq!(price_with_tax(Decimal::new(1000, 2)), Decimal::new(1100, 2));
        assert_eq!(price_with_tax(Decimal::new(999, 2)), Decimal::new(1099, 2));
    }

    #[test]
    fn prices_below_one_are_rejected() {
        assert!(validate_price(Decimal::new(99, 2)).is_err());
        assert!(validate_price(Decimal::ONE).is_ok());
        assert!(validate_price(Decimal::new(10001, 3)).is_err());
    }

    #[test]
    fn prices_beyond_the_column_range_are_rejected() {
        assert!(validate_price(Decimal::new(99_999_999, 2)).is_ok());
        let err = validate_price(Decimal::new(100_000_000, 2)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn negative_inventory_is_rejected() {
        assert!(validate_inventory(-1).is_err());
        assert!(validate_inventory(0).is_ok());
    }
}
