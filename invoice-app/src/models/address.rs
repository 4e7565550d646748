//! Address model for invoice-app.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::empty_as_none;

/// Sender or recipient block of an invoice.
///
/// Each invoice owns two rows of its own; rows are never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub address_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub address1: String,
    pub address2: Option<String>,
    pub address3: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Submitted address data for invoice create and update.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub address1: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 500))]
    pub address2: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 500))]
    pub address3: Option<String>,
}

impl AddressInput {
    /// Materialise a new row from the submitted data.
    pub fn to_address(&self, address_id: Uuid, created_utc: DateTime<Utc>) -> Address {
        Address {
            address_id,
            name: self.name.clone(),
            email: self.email.clone(),
            address1: self.address1.clone(),
            address2: self.address2.clone(),
            address3: self.address3.clone(),
            created_utc,
        }
    }
}
