//! Per-account settings model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::empty_as_none;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Settings {
    pub settings_id: Uuid,
    pub user_id: Uuid,
    pub invoice_logo: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Signature {
    pub signature_id: Uuid,
    pub settings_id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Settings row with its signature, if one was ever saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsDetails {
    #[serde(flatten)]
    pub settings: Settings,
    pub signature: Option<Signature>,
}

/// Upsert payload. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SettingsInput {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 2048))]
    pub invoice_logo: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub signature: Option<SignatureInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignatureInput {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 2048))]
    pub image: Option<String>,
}
