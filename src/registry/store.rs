use ::redis::RedisError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::Report;
use std::error::Error as StdError;
use std::fmt;

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use super::types::{EventRecord, Identity, RevocationRecord, SerialNumber};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for registry store operations.
#[derive(Debug)]
pub struct StoreError {
    error: Report,
}

impl StoreError {
    pub fn new<T>(error: T) -> Self
    where
        T: StdError + Send + Sync + 'static,
    {
        Self {
            error: Report::new(error),
        }
    }

    pub fn msg<T>(message: T) -> Self
    where
        T: fmt::Debug + fmt::Display + Send + Sync + 'static,
    {
        Self {
            error: Report::msg(message),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl From<RedisError> for StoreError {
    fn from(error: RedisError) -> Self {
        Self::new(error)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error)
    }
}

/// Abstract interface for registry storage backends.
///
/// Implementations only persist state. Authorization is enforced by
/// [`Registry`](crate::registry::Registry) before any mutating call reaches the store.
#[async_trait]
pub trait RegistryStore: Send + Sync + 'static {
    /// Binds the store to `owner` unless it is already bound.
    ///
    /// Returns the owner the store is bound to after the call.
    async fn bind_owner(&self, owner: &Identity) -> Result<Identity>;

    /// Adds a CA to the trusted set.
    ///
    /// Returns `false` if the CA was already trusted.
    async fn add_trusted_ca(&self, ca: &Identity) -> Result<bool>;

    /// Checks trusted set membership.
    async fn is_trusted_ca(&self, ca: &Identity) -> Result<bool>;

    /// Lists the trusted set, sorted.
    async fn trusted_cas(&self) -> Result<Vec<Identity>>;

    /// Stores a revocation record and appends its event to the log as a single
    /// atomic step.
    ///
    /// Returns `None` and leaves the store untouched if `serial` already has a record.
    async fn commit_revocation(
        &self,
        serial: &SerialNumber,
        record: &RevocationRecord,
        committed_at: DateTime<Utc>,
    ) -> Result<Option<EventRecord>>;

    /// Loads the revocation record for `serial`.
    async fn revocation(&self, serial: &SerialNumber) -> Result<Option<RevocationRecord>>;

    /// Number of revoked serials.
    async fn revocation_count(&self) -> Result<u64>;

    /// Reads up to `limit` events starting at sequence `from`, in log order.
    async fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>>;
}
