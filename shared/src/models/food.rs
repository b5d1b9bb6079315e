//! Food Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog food entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: String,
    pub title: String,
    /// Unit price in major currency units
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category_id: Option<String>,
}

/// Current price of one food, as returned by a price lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodPrice {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}
