//! Line item model for invoice-app.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::money;

/// Billable row on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub item_name: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub sort_order: i32,
}

/// Submitted line item.
///
/// `total` is computed by the client as `quantity * price` and stored as sent.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemInput {
    #[validate(length(min = 1, max = 200))]
    pub item_name: String,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(custom(function = "money"))]
    pub price: Decimal,
    #[validate(custom(function = "money"))]
    pub total: Decimal,
}

impl LineItemInput {
    pub fn to_line_item(&self, line_item_id: Uuid, invoice_id: Uuid, sort_order: i32) -> LineItem {
        LineItem {
            line_item_id,
            invoice_id,
            item_name: self.item_name.clone(),
            quantity: self.quantity,
            price: self.price,
            total: self.total,
            sort_order,
        }
    }
}
