use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::core::errors::ApiError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Shared secret guarding the knowledge ingestion endpoint.
#[derive(Clone)]
pub struct AdminToken {
    value: Option<String>,
}

impl AdminToken {
    pub fn new(value: Option<String>) -> Self {
        let value = value
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Self { value }
    }

    pub fn is_configured(&self) -> bool {
        self.value.is_some()
    }

    fn matches(&self, candidate: &str) -> bool {
        match &self.value {
            Some(expected) => bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())),
            None => false,
        }
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminToken")
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Rejects the request unless `x-admin-token` equals the configured secret.
///
/// An unconfigured secret rejects every request.
pub fn require_admin_token(headers: &HeaderMap, expected: &AdminToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    if !expected.matches(header_value) {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
