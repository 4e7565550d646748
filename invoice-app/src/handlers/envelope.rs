//! Uniform `{success, data | error}` response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use service_core::error::AppError;

use crate::auth::{require_identity, Identity};
use crate::models::Pagination;
use crate::services::metrics::ERRORS_TOTAL;

pub const INVALID_REQUEST: &str = "Invalid request data";

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
        }
    }

    pub fn page(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::data(data)
        }
    }
}

impl Envelope<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message),
            pagination: None,
        }
    }
}

/// Failed handler result.
///
/// Built from an [`AppError`] plus the message to show when the error's own
/// message is not meant for callers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
}

impl ApiError {
    pub fn new(err: AppError, fallback: &'static str) -> Self {
        let status = err.status_code();
        let error = match &err {
            AppError::ValidationError(_) => INVALID_REQUEST.to_string(),
            other => other
                .public_message()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        };

        ERRORS_TOTAL.with_label_values(&[error_type(&err)]).inc();
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "{}", fallback);
        } else {
            tracing::warn!(error = %err, status = status.as_u16(), "{}", fallback);
        }

        Self { status, error }
    }

    /// Malformed body, query or path.
    /// Anonymous callers are turned away before any path, query or body
    /// is looked at.
    pub fn signed_in(identity: Option<&Identity>) -> Result<(), Self> {
        require_identity(identity)
            .map(|_| ())
            .map_err(|e| Self::new(e, "Unauthorized"))
    }

    pub fn rejected(detail: impl std::fmt::Display) -> Self {
        tracing::warn!(error = %detail, "Rejected request");
        ERRORS_TOTAL.with_label_values(&["bad_request"]).inc();
        Self {
            status: StatusCode::BAD_REQUEST,
            error: INVALID_REQUEST.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn error(&self) -> &str {
        &self.error
    }
}

fn error_type(err: &AppError) -> &'static str {
    match err {
        AppError::ValidationError(_) => "validation",
        AppError::BadRequest(_) => "bad_request",
        AppError::NotFound(_) => "not_found",
        AppError::Unauthorized(_) => "unauthorized",
        AppError::Conflict(_) => "conflict",
        AppError::DatabaseError(_) => "database",
        AppError::EmailError(_) => "email",
        AppError::InternalError(_) | AppError::ConfigError(_) => "internal",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Failure {
            success: bool,
            error: String,
        }

        (
            self.status,
            Json(Failure {
                success: false,
                error: self.error,
            }),
        )
            .into_response()
    }
}
