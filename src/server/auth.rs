//! Password handshake, session tokens, and the request extractor
//! gating every endpoint other than `/auth`.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::common::AppError;
use crate::server::AppState;

/// Header carrying the session token on authenticated requests.
pub const TOKEN_HEADER: &str = "x-vitshare-token";

/// Generate the share password: fixed-length alphanumeric from the OS RNG.
pub fn generate_password(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Constant-time password comparison; no early exit on first mismatch.
pub fn verify_password(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Tokens issued by this server session. A token stays valid until the
/// server stops; there is no per-client revocation.
#[derive(Clone, Default)]
pub struct TokenStore {
    tokens: Arc<DashMap<String, Instant>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh opaque token after a successful handshake.
    pub fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), Instant::now());
        tracing::debug!("issued session token");
        token
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Extracted and validated session token.
pub struct AuthToken(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing session token".to_string()))?;

        if token.trim().is_empty() || !state.tokens.is_valid(token) {
            tracing::warn!("rejected request with invalid session token");
            return Err(AppError::Unauthorized("invalid session token".to_string()));
        }

        Ok(AuthToken(token.to_string()))
    }
}
