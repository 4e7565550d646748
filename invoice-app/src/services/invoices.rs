//! Invoice operations, scoped to the calling account.

use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{require_identity, Identity};
use crate::models::{InvoiceCountFilter, InvoiceDetails, InvoiceInput, PageRequest, Pagination};
use crate::services::metrics::INVOICES_TOTAL;
use crate::services::store::{InvoiceStore, UserStore};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice not found"))
}

#[instrument(skip_all)]
pub async fn create_invoice<S: InvoiceStore + UserStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
    input: &InvoiceInput,
) -> Result<InvoiceDetails, AppError> {
    let identity = require_identity(identity)?;
    input.validate()?;
    store.ensure_user(identity).await?;

    let details = store.create_invoice(identity.id, input).await?;

    INVOICES_TOTAL
        .with_label_values(&["create", details.invoice.status.as_str()])
        .inc();
    info!(invoice_id = %details.invoice.invoice_id, "Invoice created");

    Ok(details)
}

/// Replace the invoice's addresses, scalars and items. Invoices of other
/// accounts are reported as not found.
#[instrument(skip(store, identity, input), fields(invoice_id = %invoice_id))]
pub async fn update_invoice<S: InvoiceStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
    invoice_id: Uuid,
    input: &InvoiceInput,
) -> Result<InvoiceDetails, AppError> {
    let identity = require_identity(identity)?;
    input.validate()?;

    let Some(details) = store.replace_invoice(identity.id, invoice_id, input).await? else {
        warn!("Invoice not found for update");
        return Err(not_found());
    };

    INVOICES_TOTAL
        .with_label_values(&["update", details.invoice.status.as_str()])
        .inc();
    info!(items = details.items.len(), "Invoice updated");

    Ok(details)
}

/// One page of the caller's invoices, newest first.
#[instrument(skip(store, identity))]
pub async fn list_invoices<S: InvoiceStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
    page: PageRequest,
    max_page_size: u32,
) -> Result<(Vec<InvoiceDetails>, Pagination), AppError> {
    let identity = require_identity(identity)?;
    let page = page.clamp(max_page_size);

    let count_filter = InvoiceCountFilter::default();
    let (invoices, total) = tokio::try_join!(
        store.list_invoices(identity.id, &page),
        store.count_invoices(identity.id, &count_filter),
    )?;

    Ok((invoices, Pagination::new(total, &page)))
}

#[instrument(skip(store, identity), fields(invoice_id = %invoice_id))]
pub async fn get_invoice<S: InvoiceStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
    invoice_id: Uuid,
) -> Result<InvoiceDetails, AppError> {
    let identity = require_identity(identity)?;

    store
        .get_invoice(identity.id, invoice_id)
        .await?
        .ok_or_else(|| {
            warn!("Invoice not found");
            not_found()
        })
}
