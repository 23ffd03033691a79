use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit_best_effort,
    dto::customers::{CustomerList, UpdateCustomerRequest},
    entity::customers::{ActiveModel, Column, Entity as Customers, Model as CustomerModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Customer, Membership},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Find the customer profile for a user identity, creating an empty one the
/// first time the identity is seen.
pub async fn resolve_customer<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<CustomerModel> {
    if let Some(customer) = Customers::find()
        .filter(Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok(customer);
    }

    let profile = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        phone: Set(String::new()),
        birth_date: Set(None),
        membership: Set(Membership::Bronze.as_str().to_string()),
        created_at: NotSet,
    };
    // A concurrent request may create the same profile; the unique user_id wins.
    Customers::insert(profile)
        .on_conflict(OnConflict::column(Column::UserId).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;

    Customers::find()
        .filter(Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Customer>> {
    let customer = resolve_customer(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success(
        "Customer",
        customer_from_entity(customer),
        Some(Meta::empty()),
    ))
}

pub async fn update_me(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let customer = resolve_customer(&state.orm, user.user_id).await?;

    let mut active: ActiveModel = customer.into();
    if let Some(phone) = payload.phone {
        active.phone = Set(phone.trim().to_string());
    }
    if let Some(birth_date) = payload.birth_date {
        active.birth_date = Set(Some(birth_date));
    }
    if let Some(membership) = payload.membership {
        active.membership = Set(membership.as_str().to_string());
    }
    let customer = active.update(&state.orm).await?;

    log_audit_best_effort(
        &state.pool,
        Some(user.user_id),
        "customer_update",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": customer.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        customer_from_entity(customer),
        Some(Meta::empty()),
    ))
}

pub async fn list_customers(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CustomerList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Customers::find().order_by_asc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(customer_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Customer>> {
    ensure_admin(user)?;
    let customer = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Customer",
        customer_from_entity(customer),
        Some(Meta::empty()),
    ))
}

fn customer_from_entity(model: CustomerModel) -> Customer {
    Customer {
        id: model.id,
        user_id: model.user_id,
        phone: model.phone,
        birth_date: model.birth_date,
        // Rows are only written through `Membership::as_str`.
        membership: Membership::parse(&model.membership).unwrap_or(Membership::Bronze),
    }
}
