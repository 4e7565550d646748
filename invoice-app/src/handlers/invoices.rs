use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::envelope::{ApiError, Envelope};
use crate::middleware::CurrentIdentity;
use crate::models::{InvoiceDetails, InvoiceInput, PageRequest};
use crate::services::{invoices, notifications};
use crate::services::notifications::EmailSettings;
use crate::startup::AppState;

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// Unparsable ids cannot name an invoice.
fn invoice_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id).map_err(|_| {
        ApiError::new(
            AppError::NotFound(anyhow::anyhow!("Invoice not found")),
            "Invoice not found",
        )
    })
}

pub async fn create_invoice(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    body: Result<Json<InvoiceInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<InvoiceDetails>>), ApiError> {
    ApiError::signed_in(identity.as_ref())?;
    let Json(input) = body.map_err(ApiError::rejected)?;

    let details = invoices::create_invoice(state.store.as_ref(), identity.as_ref(), &input)
        .await
        .map_err(|e| ApiError::new(e, "Failed to create invoice"))?;

    Ok((StatusCode::CREATED, Json(Envelope::data(details))))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<InvoiceInput>, JsonRejection>,
) -> ApiResult<InvoiceDetails> {
    ApiError::signed_in(identity.as_ref())?;
    let id = invoice_id(path)?;
    let Json(input) = body.map_err(ApiError::rejected)?;

    let details = invoices::update_invoice(state.store.as_ref(), identity.as_ref(), id, &input)
        .await
        .map_err(|e| ApiError::new(e, "Failed to update invoice"))?;

    Ok(Json(Envelope::data(details)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Vec<InvoiceDetails>> {
    ApiError::signed_in(identity.as_ref())?;
    let Query(page) = query.map_err(ApiError::rejected)?;

    let (invoices, pagination) = invoices::list_invoices(
        state.store.as_ref(),
        identity.as_ref(),
        page,
        state.config.max_page_size,
    )
    .await
    .map_err(|e| ApiError::new(e, "Failed to fetch invoices"))?;

    Ok(Json(Envelope::page(invoices, pagination)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<InvoiceDetails> {
    ApiError::signed_in(identity.as_ref())?;
    let id = invoice_id(path)?;

    let details = invoices::get_invoice(state.store.as_ref(), identity.as_ref(), id)
        .await
        .map_err(|e| ApiError::new(e, "Failed to fetch invoice"))?;

    Ok(Json(Envelope::data(details)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendEmailRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
}

pub async fn send_invoice_email(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SendEmailRequest>, JsonRejection>,
) -> ApiResult<()> {
    ApiError::signed_in(identity.as_ref())?;
    let id = invoice_id(path)?;
    let Json(request) = body.map_err(ApiError::rejected)?;

    let fallback = "Failed to send email";
    request
        .validate()
        .map_err(|e| ApiError::new(e.into(), fallback))?;

    let settings = EmailSettings {
        from: &state.config.email.from,
        app_url: &state.config.app_url,
    };
    let message = notifications::send_invoice_email(
        state.store.as_ref(),
        state.email.as_ref(),
        identity.as_ref(),
        id,
        &request.subject,
        &settings,
    )
    .await
    .map_err(|e| ApiError::new(e, fallback))?;

    Ok(Json(Envelope::message(message)))
}
