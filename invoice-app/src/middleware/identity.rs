use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

use crate::auth::Identity;
use crate::startup::AppState;

/// Caller resolved by the configured identity provider.
///
/// Never rejects: anonymous requests yield `CurrentIdentity(None)` and the
/// domain operation decides what that means.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = state.identity.resolve(&parts.headers);

        if let Some(identity) = &identity {
            // Add to tracing span for observability
            tracing::Span::current().record("user_id", tracing::field::display(identity.id));
        }

        Ok(CurrentIdentity(identity))
    }
}
