//! Certificate revocation registry.
//!
//! The registry is bound to a single owner at construction. The owner manages the
//! set of trusted CAs, and only trusted CAs may revoke certificate serials. Every
//! committed revocation produces exactly one [`RevocationEvent`], appended to an
//! ordered event log and broadcast to live subscribers.

mod errors;

pub mod store;
pub mod types;

pub use errors::{ParseError, RegistryError};
pub use store::{MemoryStore, RedisStore, RegistryStore, StoreError};
pub use types::{EventRecord, Identity, RevocationEvent, RevocationRecord, SerialNumber};

use std::{result, sync::Arc};

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, instrument, warn};

pub(crate) const DEFAULT_EVENT_CAPACITY: usize = 1024;
pub(crate) const MAX_EVENT_PAGE: usize = 1000;

type Result<T> = result::Result<T, RegistryError>;

/// Access-controlled revocation registry.
pub struct Registry {
    owner: Identity,
    store: Arc<dyn RegistryStore>,
    // Serializes mutations so that each authorization check and the write it
    // guards form one unit of work.
    commit: Mutex<()>,
    notifier: broadcast::Sender<EventRecord>,
}

impl Registry {
    /// Opens a registry owned by `owner` on top of the provided store.
    ///
    /// A store that is already bound to a different owner is rejected with
    /// [`RegistryError::OwnerMismatch`], so ownership cannot change across restarts.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use revocation_registry::registry::{Identity, MemoryStore, Registry, SerialNumber};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let owner = Identity::new("owner")?;
    /// let ca = Identity::new("ca-1")?;
    /// let registry = Registry::open(owner.clone(), Arc::new(MemoryStore::new())).await?;
    ///
    /// registry.add_trusted_ca(&owner, ca.clone()).await?;
    /// let serial = SerialNumber::digest("123456");
    /// registry.revoke_certificate(&ca, serial, "TrustedCA-1", 1_700_000_000).await?;
    ///
    /// assert!(registry.is_revoked(&serial).await?);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(owner: Identity, store: Arc<dyn RegistryStore>) -> Result<Self> {
        Self::open_with_capacity(owner, store, DEFAULT_EVENT_CAPACITY).await
    }

    /// Like [`open`](Self::open) with a custom capacity for the live event channel.
    ///
    /// Subscribers that fall more than `capacity` events behind lose the oldest
    /// notifications and should catch up through [`events`](Self::events).
    pub async fn open_with_capacity(
        owner: Identity,
        store: Arc<dyn RegistryStore>,
        capacity: usize,
    ) -> Result<Self> {
        let stored = store.bind_owner(&owner).await?;
        if stored != owner {
            return Err(RegistryError::OwnerMismatch {
                stored,
                requested: owner,
            });
        }

        let (notifier, _) = broadcast::channel(capacity.max(1));
        info!(%owner, "Revocation registry opened");
        Ok(Self {
            owner,
            store,
            commit: Mutex::new(()),
            notifier,
        })
    }

    /// The immutable owner identity.
    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Adds `candidate` to the trusted CA set. Only the owner may call this.
    ///
    /// Returns `false` if the candidate was already trusted.
    #[instrument(skip_all, fields(caller = %caller, candidate = %candidate))]
    pub async fn add_trusted_ca(&self, caller: &Identity, candidate: Identity) -> Result<bool> {
        if caller != &self.owner {
            warn!("Rejected trusted CA grant from non-owner");
            return Err(RegistryError::OwnerOnly);
        }

        let _guard = self.commit.lock().await;
        let added = self.store.add_trusted_ca(&candidate).await?;
        if added {
            info!("Trusted CA added");
        } else {
            debug!("CA was already trusted");
        }
        Ok(added)
    }

    /// Checks whether `identity` is a trusted CA.
    pub async fn is_trusted_ca(&self, identity: &Identity) -> Result<bool> {
        Ok(self.store.is_trusted_ca(identity).await?)
    }

    /// Lists the trusted CAs in sorted order.
    pub async fn trusted_cas(&self) -> Result<Vec<Identity>> {
        Ok(self.store.trusted_cas().await?)
    }

    /// Records the revocation of `serial`. Only trusted CAs may call this.
    ///
    /// A serial can be revoked once; later attempts fail with
    /// [`RegistryError::AlreadyRevoked`] and leave the first record in place.
    /// On success the committed event is returned and broadcast to subscribers.
    #[instrument(skip_all, fields(caller = %caller, serial = %serial))]
    pub async fn revoke_certificate(
        &self,
        caller: &Identity,
        serial: SerialNumber,
        issuer_id: impl Into<String>,
        timestamp: u64,
    ) -> Result<EventRecord> {
        let _guard = self.commit.lock().await;

        if !self.store.is_trusted_ca(caller).await? {
            warn!("Rejected revocation from untrusted caller");
            return Err(RegistryError::UntrustedCaller);
        }

        let issuer_id = issuer_id.into();
        if issuer_id.trim().is_empty() {
            return Err(RegistryError::InvalidIssuer);
        }

        let record = RevocationRecord {
            issuer_id,
            timestamp,
        };
        let Some(event) = self
            .store
            .commit_revocation(&serial, &record, Utc::now())
            .await?
        else {
            warn!("Rejected revocation of an already revoked serial");
            return Err(RegistryError::AlreadyRevoked(serial));
        };

        info!(
            sequence = event.sequence,
            issuer_id = %record.issuer_id,
            timestamp,
            "Certificate revoked"
        );
        // No live subscribers is not an error; the event stays in the log.
        let _ = self.notifier.send(event.clone());
        Ok(event)
    }

    /// Checks whether `serial` has been revoked.
    pub async fn is_revoked(&self, serial: &SerialNumber) -> Result<bool> {
        Ok(self.revocation_details(serial).await?.is_some())
    }

    /// Returns the revocation record for `serial`, or `None` if it is not revoked.
    pub async fn revocation_details(
        &self,
        serial: &SerialNumber,
    ) -> Result<Option<RevocationRecord>> {
        let record = self.store.revocation(serial).await?;
        debug!(%serial, revoked = record.is_some(), "Revocation lookup");
        Ok(record)
    }

    /// Number of revoked serials.
    pub async fn revocation_count(&self) -> Result<u64> {
        Ok(self.store.revocation_count().await?)
    }

    /// Replays committed events starting at sequence `from`.
    ///
    /// At most 1000 events are returned per call.
    pub async fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>> {
        Ok(self.store.events(from, limit.min(MAX_EVENT_PAGE)).await?)
    }

    /// Subscribes to events committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.notifier.subscribe()
    }
}
