use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Product, ProductImage, Review};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub inventory: i32,
    pub collection_id: Uuid,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Decimal>,
    pub inventory: Option<i32>,
    pub collection_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddImageRequest {
    pub image: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageList {
    pub items: Vec<ProductImage>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub name: String,
    pub description: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<Review>,
}

/// Product row as shown to staff, with stock health.
#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryProduct {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub inventory: i32,
    pub inventory_status: String,
    pub collection_title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryProductList {
    pub items: Vec<InventoryProduct>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClearInventoryRequest {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearInventoryResult {
    pub updated: u64,
}
