use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit_best_effort,
    dto::collections::{CollectionList, CollectionRequest},
    entity::{
        collections::{ActiveModel, Entity as Collections},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Collection,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

#[derive(FromRow)]
struct CollectionRow {
    id: Uuid,
    title: String,
    products_count: i64,
}

pub async fn list_collections(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<CollectionList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, CollectionRow>(
        r#"
        SELECT c.id, c.title, COUNT(p.id) AS products_count
        FROM collections c
        LEFT JOIN products p ON p.collection_id = c.id
        GROUP BY c.id, c.title
        ORDER BY c.title ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM collections")
        .fetch_one(&state.pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| Collection {
            id: row.id,
            title: row.title,
            products_count: row.products_count,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Collections", CollectionList { items }, Some(meta)))
}

pub async fn get_collection(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Collection>> {
    let collection = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let products_count = count_products(state, id).await?;

    Ok(ApiResponse::success(
        "Collection",
        Collection {
            id: collection.id,
            title: collection.title,
            products_count,
        },
        Some(Meta::empty()),
    ))
}

pub async fn create_collection(
    state: &AppState,
    user: &AuthUser,
    payload: CollectionRequest,
) -> AppResult<ApiResponse<Collection>> {
    ensure_admin(user)?;
    let title = validate_title(&payload.title)?;

    let collection = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "collection_create",
        Some("collections"),
        Some(serde_json::json!({ "collection_id": collection.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Collection created",
        Collection {
            id: collection.id,
            title: collection.title,
            products_count: 0,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_collection(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CollectionRequest,
) -> AppResult<ApiResponse<Collection>> {
    ensure_admin(user)?;
    let title = validate_title(&payload.title)?;

    let existing = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.title = Set(title);
    let collection = active.update(&state.orm).await?;
    let products_count = count_products(state, id).await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "collection_update",
        Some("collections"),
        Some(serde_json::json!({ "collection_id": collection.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Collection {
            id: collection.id,
            title: collection.title,
            products_count,
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_collection(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if count_products(state, id).await? > 0 {
        return Err(AppError::Conflict(
            "Collection cannot be deleted because it includes one or more products".into(),
        ));
    }

    Collections::delete_by_id(id).exec(&state.orm).await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "collection_delete",
        Some("collections"),
        Some(serde_json::json!({ "collection_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn count_products(state: &AppState, collection_id: Uuid) -> AppResult<i64> {
    let count = Products::find()
        .filter(ProdCol::CollectionId.eq(collection_id))
        .count(&state.orm)
        .await?;
    Ok(count as i64)
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title must not be blank".into()));
    }
    if title.chars().count() > 255 {
        return Err(AppError::BadRequest("title is too long".into()));
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_titles_are_rejected() {
        assert!(matches!(validate_title("   "), Err(AppError::BadRequest(_))));
        assert_eq!(validate_title(" Beauty ").unwrap(), "Beauty");
    }
}
