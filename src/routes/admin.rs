use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::products::{ClearInventoryRequest, ClearInventoryResult, InventoryProductList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::LowInventoryQuery,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/inventory/low", get(list_low_inventory))
        .route("/inventory/clear", post(clear_inventory))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low",
    params(
        ("threshold" = Option<i32>, Query, description = "List products with inventory below this, default 10"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Low inventory products", body = ApiResponse<InventoryProductList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowInventoryQuery>,
) -> AppResult<Json<ApiResponse<InventoryProductList>>> {
    let resp = admin_service::list_low_inventory(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/inventory/clear",
    request_body = ClearInventoryRequest,
    responses(
        (status = 200, description = "Set inventory to zero", body = ApiResponse<ClearInventoryResult>),
        (status = 400, description = "No products given"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn clear_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ClearInventoryRequest>,
) -> AppResult<Json<ApiResponse<ClearInventoryResult>>> {
    let resp = admin_service::clear_inventory(&state, &user, payload).await?;
    Ok(Json(resp))
}
