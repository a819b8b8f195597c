//! JWT credential verification.
//!
//! Every per-user endpoint runs behind the [`AuthedUser`] extractor, which
//! pulls the `Authorization: Bearer` token, verifies it against the shared
//! secret (HS256, expiry checked), and hands the embedded claims to the
//! handler. Token issuance belongs to the identity service; this module
//! only verifies what it is handed.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::server::AppState;

/// Claims embedded in a verified token.
///
/// `sub` is the caller identity every per-user query is scoped by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Verifies bearer tokens against the shared signing secret.
///
/// Constructed once at startup and shared through [`AppState`].
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decode and verify a token, returning the embedded claims.
    ///
    /// Malformed tokens, bad signatures, and expired tokens all map to
    /// [`AppError::Unauthorized`]. No side effects.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "token expired",
                    ErrorKind::InvalidSignature => "invalid signature",
                    _ => "invalid token",
                };
                AppError::Unauthorized(reason.to_string())
            })
    }
}

/// Extract the Bearer token from the Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Extractor gating a handler on a verified credential.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
        let claims = state.verifier.verify(token)?;
        Ok(AuthedUser(claims))
    }
}
