use thiserror::Error;

use super::store::StoreError;
use super::types::{Identity, SerialNumber};

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Only contract owner can manage trusted CAs")]
    OwnerOnly,

    #[error("Only trusted CA can revoke certificates")]
    UntrustedCaller,

    #[error("Certificate {0} is already revoked")]
    AlreadyRevoked(SerialNumber),

    #[error("Issuer id must not be empty")]
    InvalidIssuer,

    #[error("Registry store is bound to owner {stored}, refusing to open it for {requested}")]
    OwnerMismatch {
        stored: Identity,
        requested: Identity,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    /// Stable, machine readable code for this error class.
    pub fn code(&self) -> &'static str {
        use RegistryError::*;

        match self {
            OwnerOnly => "OWNER_ONLY",
            UntrustedCaller => "UNTRUSTED_CALLER",
            AlreadyRevoked(_) => "ALREADY_REVOKED",
            InvalidIssuer => "INVALID_ISSUER",
            OwnerMismatch { .. } => "OWNER_MISMATCH",
            Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the error is a policy rejection rather than a backend failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            RegistryError::Store(_) | RegistryError::OwnerMismatch { .. }
        )
    }
}

/// Errors produced while parsing identities and serial numbers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Identity must not be empty")]
    EmptyIdentity,

    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Serial number must be 32 bytes, got {0}")]
    InvalidSerialLength(usize),

    #[error("Serial number is not valid hex: {0}")]
    InvalidSerialHex(#[from] hex::FromHexError),
}
