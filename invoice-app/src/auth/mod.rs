//! Current-identity capability.
//!
//! Handlers never look at headers themselves: an [`IdentityProvider`]
//! resolves the caller once per request and the result is passed into every
//! domain operation.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::UserRole;

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub currency: Option<String>,
}

impl Identity {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            role: UserRole::User,
            first_name: None,
            last_name: None,
            currency: None,
        }
    }
}

/// Unwrap the caller or fail with `Unauthorized`.
pub fn require_identity(identity: Option<&Identity>) -> Result<&Identity, AppError> {
    identity.ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("No authenticated session")))
}

/// Resolves the caller of a request. Anything that cannot be verified
/// resolves to `None`.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Session token claims as issued by the sign-in flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Account id.
    pub sub: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

fn default_role() -> UserRole {
    UserRole::User
}

impl SessionClaims {
    pub fn for_identity(identity: &Identity, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: identity.role,
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            currency: identity.currency.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Verifies HS256 session tokens from `Authorization: Bearer <jwt>`.
pub struct SessionTokenProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionTokenProvider {
    pub fn new(secret: &Secret<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    fn verify(&self, token: &str) -> Result<Identity, anyhow::Error> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|e| anyhow::anyhow!("Invalid subject in session token: {}", e))?;

        Ok(Identity {
            id,
            email: claims.email,
            role: claims.role,
            first_name: claims.first_name,
            last_name: claims.last_name,
            currency: claims.currency,
        })
    }
}

impl IdentityProvider for SessionTokenProvider {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer_token(headers)?;
        match self.verify(token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session token");
                None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }
    Some(token.trim())
}

/// Sign a session token for `identity`. Used by tooling and tests.
pub fn encode_session_token(
    identity: &Identity,
    secret: &Secret<String>,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        &SessionClaims::for_identity(identity, ttl),
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn secret() -> Secret<String> {
        Secret::new("test-secret".to_string())
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn resolves_valid_token() {
        let mut identity = Identity::new(Uuid::new_v4(), "owner@acme.test");
        identity.currency = Some("EUR".to_string());
        identity.first_name = Some("Ada".to_string());
        let token = encode_session_token(&identity, &secret(), Duration::hours(1)).unwrap();

        let provider = SessionTokenProvider::new(&secret());
        let resolved = provider.resolve(&headers(&format!("Bearer {}", token)));

        assert_eq!(resolved, Some(identity));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let identity = Identity::new(Uuid::new_v4(), "owner@acme.test");
        let other = Secret::new("other-secret".to_string());
        let token = encode_session_token(&identity, &other, Duration::hours(1)).unwrap();

        let provider = SessionTokenProvider::new(&secret());
        assert!(provider.resolve(&headers(&format!("Bearer {}", token))).is_none());
    }

    #[test]
    fn rejects_expired_token() {
        let identity = Identity::new(Uuid::new_v4(), "owner@acme.test");
        let token = encode_session_token(&identity, &secret(), Duration::hours(-2)).unwrap();

        let provider = SessionTokenProvider::new(&secret());
        assert!(provider.resolve(&headers(&format!("Bearer {}", token))).is_none());
    }

    #[test]
    fn missing_or_malformed_header_is_anonymous() {
        let provider = SessionTokenProvider::new(&secret());
        assert!(provider.resolve(&HeaderMap::new()).is_none());
        assert!(provider.resolve(&headers("Basic abc")).is_none());
        assert!(provider.resolve(&headers("Bearer not-a-jwt")).is_none());
    }
}
