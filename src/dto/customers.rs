use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Customer, Membership};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCustomerRequest {
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub membership: Option<Membership>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerList {
    pub items: Vec<Customer>,
}
