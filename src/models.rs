use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Collection {
    pub id: Uuid,
    pub title: String,
    pub products_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub inventory: i32,
    #[schema(value_type = String, example = "10.00")]
    pub unit_price: Decimal,
    #[schema(value_type = String, example = "11.00")]
    pub price_with_tax: Decimal,
    pub collection_id: Uuid,
    pub images: Vec<ProductImage>,
    pub last_update: DateTime<Utc>,
}

/// Product reference embedded in cart and order lines.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SimpleProduct {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product: SimpleProduct,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: Uuid,
    pub items: Vec<CartItem>,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Bronze,
    Silver,
    Gold,
}

impl Membership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::Bronze => "bronze",
            Membership::Silver => "silver",
            Membership::Gold => "gold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bronze" => Some(Membership::Bronze),
            "silver" => Some(Membership::Silver),
            "gold" => Some(Membership::Gold),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub membership: Membership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Complete,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Complete => "complete",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "complete" => Some(PaymentStatus::Complete),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub product: SimpleProduct,
    /// Price captured when the order was placed.
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub placed_at: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItem>,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}
