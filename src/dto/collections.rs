use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Collection;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CollectionRequest {
    pub title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionList {
    pub items: Vec<Collection>,
}
