//! Invoice model for invoice-app.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{
    empty_as_none, money, percentage, valid_currency, Address, AddressInput, LineItem,
    LineItemInput,
};

pub const DEFAULT_CURRENCY: &str = "USD";

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Unpaid
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "UNPAID" => Ok(InvoiceStatus::Unpaid),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            "CANCELLED" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("unknown invoice status '{}'", other)),
        }
    }
}

/// Invoice row.
///
/// Totals are stored exactly as submitted; nothing here recomputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub from_address_id: Uuid,
    pub to_address_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub sub_total: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub discount: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub tax_percentage: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub notes: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Invoice aggregate: the invoice with both addresses and its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceDetails {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub from: Address,
    pub to: Address,
    pub items: Vec<LineItem>,
}

/// Invoice with its parties, without items (dashboard feed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentInvoice {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub from: Address,
    pub to: Address,
}

/// Projection used by the dashboard revenue series.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RevenueSample {
    pub invoice_date: NaiveDate,
    pub total: Decimal,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
}

/// Filter for invoice counts.
#[derive(Debug, Clone, Default)]
pub struct InvoiceCountFilter {
    /// Only invoices dated on or after this day.
    pub since: Option<NaiveDate>,
    pub status: Option<InvoiceStatus>,
}

/// Submitted invoice form, shared by create and update.
///
/// On create, a missing currency defaults to USD and a missing status to
/// UNPAID. On update, missing optional scalars keep their stored value.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "check_invoice_fields"))]
pub struct InvoiceInput {
    #[validate(length(min = 1, max = 64))]
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub currency: Option<String>,
    #[validate(nested)]
    pub from: AddressInput,
    #[validate(nested)]
    pub to: AddressInput,
    #[validate(length(min = 1), nested)]
    pub items: Vec<LineItemInput>,
    #[validate(custom(function = "money"))]
    pub sub_total: Decimal,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub tax_percentage: Option<Decimal>,
    #[validate(custom(function = "money"))]
    pub total: Decimal,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
}

impl InvoiceInput {
    /// Currency to store on create, upper-cased.
    pub fn currency_or_default(&self) -> String {
        self.currency
            .as_deref()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }

    pub fn status_or_default(&self) -> InvoiceStatus {
        self.status.unwrap_or_default()
    }
}

/// Cross-field and optional-field rules.
fn check_invoice_fields(input: &InvoiceInput) -> Result<(), ValidationError> {
    if input.due_date < input.invoice_date {
        return Err(ValidationError::new("due_date_before_invoice_date"));
    }
    if let Some(currency) = input.currency.as_deref() {
        valid_currency(currency)?;
    }
    if let Some(discount) = &input.discount {
        money(discount)?;
    }
    if let Some(tax) = &input.tax_percentage {
        percentage(tax)?;
    }
    Ok(())
}
