//! Invoice email dispatch.

use service_core::error::AppError;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{require_identity, Identity};
use crate::models::DEFAULT_CURRENCY;
use crate::services::formatting::InvoiceEmail;
use crate::services::metrics::EMAILS_TOTAL;
use crate::services::providers::{EmailMessage, EmailProvider};
use crate::services::store::InvoiceStore;

pub const EMAIL_SENT: &str = "Email sent successfully";

/// Sender address and link base for outgoing invoice email.
#[derive(Debug, Clone)]
pub struct EmailSettings<'a> {
    pub from: &'a str,
    pub app_url: &'a str,
}

fn render_error(e: askama::Error) -> AppError {
    error!(error = %e, "Failed to render invoice email");
    AppError::InternalError(anyhow::anyhow!("Failed to render invoice email: {}", e))
}

/// Render the invoice and hand it to the delivery provider once.
///
/// The provider's own error message is returned to the caller unchanged.
#[instrument(skip(store, provider, identity, subject, settings), fields(invoice_id = %invoice_id))]
pub async fn send_invoice_email<S, P>(
    store: &S,
    provider: &P,
    identity: Option<&Identity>,
    invoice_id: Uuid,
    subject: &str,
    settings: &EmailSettings<'_>,
) -> Result<&'static str, AppError>
where
    S: InvoiceStore + ?Sized,
    P: EmailProvider + ?Sized,
{
    let identity = require_identity(identity)?;

    let Some(details) = store.get_invoice(identity.id, invoice_id).await? else {
        warn!("Invoice not found for email");
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    };

    let Some(recipient) = details.to.email.as_deref() else {
        EMAILS_TOTAL.with_label_values(&["rejected"]).inc();
        warn!("Recipient has no email address");
        return Err(AppError::BadRequest(anyhow::anyhow!("Client email not found")));
    };

    let currency = if details.invoice.currency.is_empty() {
        DEFAULT_CURRENCY
    } else {
        details.invoice.currency.as_str()
    };
    let payment_link = format!("{}/invoice/paid/{}", settings.app_url, invoice_id);
    let body = InvoiceEmail {
        client_name: &details.to.name,
        invoice_no: &details.invoice.invoice_no,
        due_date: details.invoice.due_date,
        total: details.invoice.total,
        currency,
        payment_link: &payment_link,
    };

    let message = EmailMessage {
        from: settings.from.to_string(),
        to: recipient.to_string(),
        subject: subject.to_string(),
        body_text: Some(body.render_text().map_err(render_error)?),
        body_html: Some(body.render_html().map_err(render_error)?),
    };

    match provider.send(&message).await {
        Ok(response) => {
            EMAILS_TOTAL.with_label_values(&["sent"]).inc();
            info!(provider_id = ?response.provider_id, "Invoice email sent");
            Ok(EMAIL_SENT)
        }
        Err(e) => {
            EMAILS_TOTAL.with_label_values(&["failed"]).inc();
            error!(error = %e, "Invoice email delivery failed");
            Err(AppError::EmailError(e.message().to_string()))
        }
    }
}
