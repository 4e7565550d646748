//! Account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{empty_as_none, valid_currency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image: Option<String>,
    pub currency: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Profile patch. Only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "check_user_fields"))]
pub struct UpdateUser {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub currency: Option<String>,
}

impl UpdateUser {
    pub fn normalized_currency(&self) -> Option<String> {
        self.currency.as_deref().map(|c| c.to_ascii_uppercase())
    }
}

fn check_user_fields(input: &UpdateUser) -> Result<(), ValidationError> {
    match input.currency.as_deref() {
        Some(code) => valid_currency(code),
        None => Ok(()),
    }
}
