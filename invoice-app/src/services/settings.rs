use service_core::error::AppError;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{require_identity, Identity};
use crate::models::{SettingsDetails, SettingsInput};
use crate::services::store::{SettingsStore, UserStore};

/// `None` until the account saves settings for the first time.
#[instrument(skip_all)]
pub async fn get_settings<S: SettingsStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
) -> Result<Option<SettingsDetails>, AppError> {
    let identity = require_identity(identity)?;
    store.get_settings(identity.id).await
}

#[instrument(skip_all)]
pub async fn update_settings<S: SettingsStore + UserStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
    input: &SettingsInput,
) -> Result<SettingsDetails, AppError> {
    let identity = require_identity(identity)?;
    input.validate()?;
    store.ensure_user(identity).await?;

    let settings = store.upsert_settings(identity.id, input).await?;
    info!(has_signature = settings.signature.is_some(), "Settings updated");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignatureInput;
    use crate::services::memory::InMemoryStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn settings_are_created_then_patched() {
        let store = InMemoryStore::new();
        let owner = Identity::new(Uuid::new_v4(), "a@acme.test");

        assert!(get_settings(&store, Some(&owner)).await.unwrap().is_none());

        let first = update_settings(
            &store,
            Some(&owner),
            &SettingsInput {
                invoice_logo: Some("https://cdn.test/logo.png".to_string()),
                signature: Some(SignatureInput {
                    name: Some("Ada".to_string()),
                    image: None,
                }),
            },
        )
        .await
        .unwrap();

        let second = update_settings(
            &store,
            Some(&owner),
            &SettingsInput {
                invoice_logo: None,
                signature: Some(SignatureInput {
                    name: None,
                    image: Some("https://cdn.test/sig.png".to_string()),
                }),
            },
        )
        .await
        .unwrap();

        assert_eq!(second.settings.settings_id, first.settings.settings_id);
        assert_eq!(second.settings.invoice_logo.as_deref(), Some("https://cdn.test/logo.png"));
        let signature = second.signature.unwrap();
        assert_eq!(signature.signature_id, first.signature.unwrap().signature_id);
        assert_eq!(signature.name.as_deref(), Some("Ada"));
        assert_eq!(signature.image.as_deref(), Some("https://cdn.test/sig.png"));
    }
}
