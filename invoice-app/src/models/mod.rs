//! Domain models for invoice-app.

mod address;
mod dashboard;
mod invoice;
mod line_item;
mod pagination;
mod settings;
mod user;

pub use address::{Address, AddressInput};
pub use dashboard::{ChartBucket, ChartPoint, DashboardQuery, DashboardStats};
pub use invoice::{
    Invoice, InvoiceCountFilter, InvoiceDetails, InvoiceInput, InvoiceStatus, RecentInvoice,
    RevenueSample, DEFAULT_CURRENCY,
};
pub use line_item::{LineItem, LineItemInput};
pub use pagination::{PageRequest, Pagination, DEFAULT_PAGE_SIZE};
pub use settings::{Settings, SettingsDetails, SettingsInput, Signature, SignatureInput};
pub use user::{UpdateUser, User, UserRole};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use validator::ValidationError;

/// Deserialize an optional string, treating `""` and whitespace as absent.
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Largest magnitude a `NUMERIC(12,2)` money column holds, exclusive.
const MONEY_LIMIT: i64 = 10_000_000_000;

/// At most two fraction digits once trailing zeros are dropped.
fn cents(value: &Decimal) -> Result<(), ValidationError> {
    if value.normalize().scale() > 2 {
        return Err(ValidationError::new("too_many_decimals"));
    }
    Ok(())
}

/// Non-negative amount that the money columns store exactly.
pub(crate) fn money(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_amount"));
    }
    if value.abs() >= Decimal::from(MONEY_LIMIT) {
        return Err(ValidationError::new("amount_too_large"));
    }
    cents(value)
}

pub(crate) fn percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percentage_out_of_range"));
    }
    cents(value)
}

/// Three ASCII letters, case-insensitive (`usd`, `EUR`).
pub(crate) fn valid_currency(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_currency"))
    }
}
