use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddCartItemRequest, CartItemList, UpdateCartItemRequest},
    error::AppResult,
    models::{Cart, CartItem},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

// Carts are anonymous; knowing the cart id is what grants access to it.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/{id}", get(get_cart).delete(delete_cart))
        .route("/{id}/items", get(list_items).post(add_item))
        .route("/{id}/items/{item_id}", patch(update_item).delete(remove_item))
}

#[utoipa::path(
    post,
    path = "/api/carts",
    responses(
        (status = 201, description = "Create an empty cart", body = ApiResponse<Cart>)
    ),
    tag = "Carts"
)]
pub async fn create_cart(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<ApiResponse<Cart>>)> {
    let resp = cart_service::create_cart(&state).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/carts/{id}",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart with items and total", body = ApiResponse<Cart>),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::get_cart(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{id}",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::delete_cart(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/carts/{id}/items",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "List cart items", body = ApiResponse<CartItemList>),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartItemList>>> {
    let resp = cart_service::list_items(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/carts/{id}/items",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Add product or increase its quantity", body = ApiResponse<CartItem>),
        (status = 400, description = "Unknown product or invalid quantity"),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddCartItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CartItem>>)> {
    let resp = cart_service::add_item(&state, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/carts/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartItem>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Carts"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::update_item(&state, id, item_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Removed from cart", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Carts"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_item(&state, id, item_id).await?;
    Ok(Json(resp))
}
