//! Store abstraction for invoice-app.
//!
//! Every read and write takes the owning account id; rows owned by another
//! account behave exactly like rows that do not exist.

use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::{
    InvoiceCountFilter, InvoiceDetails, InvoiceInput, PageRequest, RecentInvoice, RevenueSample,
    SettingsDetails, SettingsInput, UpdateUser, User,
};

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist both addresses, the invoice and its items as one unit.
    async fn create_invoice(
        &self,
        user_id: Uuid,
        input: &InvoiceInput,
    ) -> Result<InvoiceDetails, AppError>;

    async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetails>, AppError>;

    /// Overwrite addresses and scalars and replace the full item set.
    /// Returns `None` when the invoice is absent or owned by someone else.
    async fn replace_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: &InvoiceInput,
    ) -> Result<Option<InvoiceDetails>, AppError>;

    /// Newest first.
    async fn list_invoices(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<InvoiceDetails>, AppError>;

    async fn count_invoices(
        &self,
        user_id: Uuid,
        filter: &InvoiceCountFilter,
    ) -> Result<i64, AppError>;

    /// `{date, total, status}` of invoices dated on or after `since`.
    async fn revenue_samples(
        &self,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<RevenueSample>, AppError>;

    /// Most recently created invoices with their parties.
    async fn recent_invoices(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<RecentInvoice>, AppError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self, user_id: Uuid) -> Result<Option<SettingsDetails>, AppError>;

    /// Create the row on first use, patch it afterwards.
    async fn upsert_settings(
        &self,
        user_id: Uuid,
        input: &SettingsInput,
    ) -> Result<SettingsDetails, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Provision the account row for a signed-in caller on first use.
    /// An existing row is returned untouched. Fails with `Conflict` when the
    /// email already belongs to a different account.
    async fn ensure_user(&self, identity: &Identity) -> Result<User, AppError>;

    async fn update_user(
        &self,
        user_id: Uuid,
        update: &UpdateUser,
    ) -> Result<Option<User>, AppError>;
}

/// Everything the HTTP layer needs from persistence.
#[async_trait]
pub trait Store: InvoiceStore + SettingsStore + UserStore {
    async fn health_check(&self) -> Result<(), AppError>;
}
