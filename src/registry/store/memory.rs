use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use crate::registry::store::{RegistryStore, Result, StoreError};
use crate::registry::types::{
    EventRecord, Identity, RevocationEvent, RevocationRecord, SerialNumber,
};

/// An in-memory registry store.
///
/// State lives as long as the process. Useful for testing and development.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    owner: Arc<OnceLock<Identity>>,
    trusted_cas: Arc<DashSet<Identity>>,
    revocations: Arc<DashMap<SerialNumber, RevocationRecord>>,
    events: Arc<RwLock<Vec<EventRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn bind_owner(&self, owner: &Identity) -> Result<Identity> {
        Ok(self.owner.get_or_init(|| owner.clone()).clone())
    }

    async fn add_trusted_ca(&self, ca: &Identity) -> Result<bool> {
        Ok(self.trusted_cas.insert(ca.clone()))
    }

    async fn is_trusted_ca(&self, ca: &Identity) -> Result<bool> {
        Ok(self.trusted_cas.contains(ca))
    }

    async fn trusted_cas(&self) -> Result<Vec<Identity>> {
        let mut cas: Vec<Identity> = self.trusted_cas.iter().map(|ca| ca.key().clone()).collect();
        cas.sort();
        Ok(cas)
    }

    async fn commit_revocation(
        &self,
        serial: &SerialNumber,
        record: &RevocationRecord,
        committed_at: DateTime<Utc>,
    ) -> Result<Option<EventRecord>> {
        // The shard lock of the entry is held until the event is appended, so
        // readers never see a record without its event.
        match self.revocations.entry(*serial) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(vacant) => {
                let mut events = self
                    .events
                    .write()
                    .map_err(|_| StoreError::msg("event log lock poisoned"))?;
                let sequence = u64::try_from(events.len()).map_err(StoreError::new)?;
                let event = EventRecord {
                    sequence,
                    committed_at,
                    event: RevocationEvent::new(*serial, record),
                };
                events.push(event.clone());
                vacant.insert(record.clone());
                Ok(Some(event))
            }
        }
    }

    async fn revocation(&self, serial: &SerialNumber) -> Result<Option<RevocationRecord>> {
        Ok(self.revocations.get(serial).map(|r| r.value().clone()))
    }

    async fn revocation_count(&self) -> Result<u64> {
        Ok(self.revocations.len() as u64)
    }

    async fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>> {
        let events = self
            .events
            .read()
            .map_err(|_| StoreError::msg("event log lock poisoned"))?;
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(events.len());
        let end = start.saturating_add(limit).min(events.len());
        Ok(events[start..end].to_vec())
    }
}
