use std::collections::HashMap;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use ring::digest::{SHA256, digest};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::registry::{Identity, ParseError};
use crate::server::{AppState, errors::ApiError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid identity in token table: {0}")]
    InvalidIdentity(#[from] ParseError),

    #[error("Empty token configured for {0}")]
    EmptyToken(Identity),

    #[error("The same token is configured for {first} and {second}")]
    DuplicateToken { first: Identity, second: Identity },
}

/// Resolves bearer tokens to caller identities.
///
/// Only SHA-256 fingerprints of the configured tokens are kept in memory, and
/// lookups go through the fingerprint of the presented token.
#[derive(Debug, Default)]
pub struct TokenAuthenticator {
    identities: HashMap<Vec<u8>, Identity>,
}

impl TokenAuthenticator {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let mut authenticator = Self::default();
        for entry in &config.tokens {
            let identity = Identity::new(&entry.identity)?;
            authenticator.insert(identity, entry.token.expose_secret())?;
        }
        Ok(authenticator)
    }

    /// Registers `token` for `identity`.
    pub fn insert(&mut self, identity: Identity, token: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::EmptyToken(identity));
        }
        let fingerprint = fingerprint(token);
        if let Some(first) = self.identities.get(&fingerprint) {
            return Err(AuthError::DuplicateToken {
                first: first.clone(),
                second: identity,
            });
        }
        self.identities.insert(fingerprint, identity);
        Ok(())
    }

    pub fn authenticate(&self, token: &str) -> Option<&Identity> {
        self.identities.get(&fingerprint(token))
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

fn fingerprint(token: &str) -> Vec<u8> {
    digest(&SHA256, token.as_bytes()).as_ref().to_vec()
}

// Auth schemes are case-insensitive
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("Bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Authenticated caller of a mutating endpoint.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::Unauthorized)?;

        match state.auth.authenticate(token) {
            Some(identity) => Ok(Caller(identity.clone())),
            None => {
                tracing::warn!("Rejected request with unknown bearer token");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
