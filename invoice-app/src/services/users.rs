use service_core::error::AppError;
use tracing::{instrument, warn};
use validator::Validate;

use crate::auth::{require_identity, Identity};
use crate::models::{UpdateUser, User};
use crate::services::store::UserStore;

/// Stored profile of the caller, provisioned from the session on first use.
#[instrument(skip_all)]
pub async fn get_current_user<S: UserStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
) -> Result<User, AppError> {
    let identity = require_identity(identity)?;
    store.ensure_user(identity).await
}

#[instrument(skip_all)]
pub async fn update_user<S: UserStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
    update: &UpdateUser,
) -> Result<User, AppError> {
    let identity = require_identity(identity)?;
    update.validate()?;
    store.ensure_user(identity).await?;

    store.update_user(identity.id, update).await?.ok_or_else(|| {
        warn!("Account row missing on profile update");
        AppError::NotFound(anyhow::anyhow!("User not found"))
    })
}
