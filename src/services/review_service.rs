use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::products::{CreateReviewRequest, ReviewList},
    entity::reviews::{ActiveModel, Column, Entity as Reviews, Model as ReviewModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::product_service::find_product,
    state::AppState,
};

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    find_product(state, product_id).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Reviews::find()
        .filter(Column::ProductId.eq(product_id))
        .order_by_desc(Column::Date);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn create_review(
    state: &AppState,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    find_product(state, product_id).await?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be blank".into()));
    }
    if payload.description.trim().is_empty() {
        return Err(AppError::BadRequest("description must not be blank".into()));
    }

    let review = ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        name: Set(name.to_string()),
        description: Set(payload.description),
        date: Set(payload.date.unwrap_or_else(|| Utc::now().date_naive())),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Review created",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub async fn get_review(
    state: &AppState,
    product_id: Uuid,
    id: Uuid,
) -> AppResult<ApiResponse<Review>> {
    let review = Reviews::find()
        .filter(
            Condition::all()
                .add(Column::Id.eq(id))
                .add(Column::ProductId.eq(product_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success(
        "Review",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Reviews::delete_many()
        .filter(Column::Id.eq(id))
        .filter(Column::ProductId.eq(product_id))
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

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        product_id: model.product_id,
        date: model.date,
        name: model.name,
        description: model.description,
    }
}
