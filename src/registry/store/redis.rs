use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script, aio::ConnectionManager};
use serde::{Deserialize, Serialize};

use crate::registry::store::{RegistryStore, Result, StoreError};
use crate::registry::types::{
    EventRecord, Identity, RevocationEvent, RevocationRecord, SerialNumber,
};

/// Default Redis key prefix for registry state.
pub const DEFAULT_PREFIX: &str = "revocation_registry";

// KEYS[1] = revocation hash, KEYS[2] = event list
// ARGV[1] = serial, ARGV[2] = record json, ARGV[3] = event json
// Returns the sequence of the appended event, or -1 if the serial is already revoked.
const COMMIT_REVOCATION_SCRIPT: &str = r"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then
    return -1
end
return redis.call('RPUSH', KEYS[2], ARGV[3]) - 1
";

/// Maps a page request onto inclusive `LRANGE` bounds.
///
/// Returns `None` when the page is empty by construction.
fn lrange_bounds(from: u64, limit: usize) -> Option<(isize, isize)> {
    if limit == 0 {
        return None;
    }
    let start = isize::try_from(from).ok()?;
    let span = isize::try_from(limit).unwrap_or(isize::MAX);
    Some((start, start.saturating_add(span - 1)))
}

/// Event as persisted in the Redis list. The sequence is the list index.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEvent {
    committed_at: DateTime<Utc>,
    event: RevocationEvent,
}

/// A Redis registry store.
///
/// State is kept under four keys sharing a common prefix: the owner string,
/// the trusted CA set, the revocation hash and the event list.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    commit_script: Script,
}

impl RedisStore {
    /// Creates a new Redis store from a connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
            commit_script: Script::new(COMMIT_REVOCATION_SCRIPT),
        }
    }

    /// Uses a custom key prefix, allowing several registries to share a database.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{name}", self.prefix)
    }
}

#[async_trait]
impl RegistryStore for RedisStore {
    async fn bind_owner(&self, owner: &Identity) -> Result<Identity> {
        let mut conn = self.conn.clone();
        let key = self.key("owner");
        let _: bool = conn.set_nx(&key, owner.as_str()).await?;
        let stored: Option<String> = conn.get(&key).await?;
        let stored = stored.ok_or_else(|| StoreError::msg("owner key vanished after SETNX"))?;
        Identity::new(stored).map_err(StoreError::new)
    }

    async fn add_trusted_ca(&self, ca: &Identity) -> Result<bool> {
        let mut conn = self.conn.clone();
        let added: u64 = conn.sadd(self.key("trusted_cas"), ca.as_str()).await?;
        Ok(added > 0)
    }

    async fn is_trusted_ca(&self, ca: &Identity) -> Result<bool> {
        let mut conn = self.conn.clone();
        let trusted: bool = conn.sismember(self.key("trusted_cas"), ca.as_str()).await?;
        Ok(trusted)
    }

    async fn trusted_cas(&self) -> Result<Vec<Identity>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(self.key("trusted_cas")).await?;
        let mut cas = members
            .into_iter()
            .map(Identity::new)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::new)?;
        cas.sort();
        Ok(cas)
    }

    async fn commit_revocation(
        &self,
        serial: &SerialNumber,
        record: &RevocationRecord,
        committed_at: DateTime<Utc>,
    ) -> Result<Option<EventRecord>> {
        let mut conn = self.conn.clone();
        let event = RevocationEvent::new(*serial, record);
        let stored = StoredEvent {
            committed_at,
            event,
        };
        let record_json = serde_json::to_string(record)?;
        let event_json = serde_json::to_string(&stored)?;

        let sequence: i64 = self
            .commit_script
            .key(self.key("revocations"))
            .key(self.key("events"))
            .arg(serial.to_hex())
            .arg(record_json)
            .arg(event_json)
            .invoke_async(&mut conn)
            .await?;

        if sequence < 0 {
            return Ok(None);
        }
        Ok(Some(EventRecord {
            sequence: sequence as u64,
            committed_at: stored.committed_at,
            event: stored.event,
        }))
    }

    async fn revocation(&self, serial: &SerialNumber) -> Result<Option<RevocationRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(self.key("revocations"), serial.to_hex()).await?;
        raw.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    async fn revocation_count(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.hlen(self.key("revocations")).await?;
        Ok(count)
    }

    async fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>> {
        let Some((start, stop)) = lrange_bounds(from, limit) else {
            return Ok(Vec::new());
        };

        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(self.key("events"), start, stop).await?;
        raw.into_iter()
            .zip(from..)
            .map(|(json, sequence)| -> Result<EventRecord> {
                let stored: StoredEvent = serde_json::from_str(&json)?;
                Ok(EventRecord {
                    sequence,
                    committed_at: stored.committed_at,
                    event: stored.event,
                })
            })
            .collect()
    }
}
