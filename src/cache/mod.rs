// Cache envelope for the persisted record list.
// Handles JSON serialization, TTL checking, and cache invalidation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::record::Record;
use crate::store::CacheStore;

/// How long cached records stay trustworthy: 45 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(45 * 60);

/// Persisted wrapper pairing cached records with their write timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The accumulated record list as of the last persist.
    pub data: Vec<Record>,
    /// When `data` was last fully persisted. Epoch millis on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Envelope stamped with the current instant.
    pub fn now(data: Vec<Record>) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }

    /// True iff `now - timestamp >= ttl`.
    ///
    /// Expiry is relative to the write timestamp, not the last read,
    /// so staleness is bounded by a fixed wall-clock window regardless
    /// of read frequency. A timestamp in the future (clock adjustment)
    /// counts as fresh.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let elapsed = now
            .signed_duration_since(self.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed >= ttl
    }
}

/// Read and parse the persisted envelope.
/// Missing or malformed payloads are a cache miss, never an error.
pub async fn load(store: &dyn CacheStore, key: &str) -> Option<Envelope> {
    let raw = match store.get(key).await {
        Ok(raw) => raw?,
        Err(err) => {
            debug!(key, %err, "cache read failed, treating as miss");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(envelope) => Some(envelope),
        Err(err) => {
            debug!(key, %err, "malformed cache payload, treating as miss");
            None
        }
    }
}

/// Serialize and persist an envelope. Does not validate staleness.
pub async fn save(store: &dyn CacheStore, key: &str, envelope: &Envelope) -> Result<()> {
    let json = serde_json::to_string(envelope)?;
    store.set(key, &json).await
}

/// Remove the persisted envelope.
/// Store failures are logged and swallowed: a failed clear must never
/// block the read/fetch path.
pub async fn clear(store: &dyn CacheStore, key: &str) {
    if let Err(err) = store.remove(key).await {
        warn!(key, %err, "failed to clear cache");
    }
}
