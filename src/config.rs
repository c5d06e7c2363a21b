// Synchronizer configuration.
// Defaults match the reference product behavior: a 45-minute TTL and
// one fixed store key each for the record list and the lifecycle marker.

use std::time::Duration;

use crate::cache::DEFAULT_TTL;

/// Default store key for the record-list envelope.
pub const ENVELOPE_KEY: &str = "feed_records";

/// Default store key for the background-transition marker.
pub const MARKER_KEY: &str = "last_background";

/// Tunables shared by the sync controller and the lifecycle monitor.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long cached records stay trustworthy.
    pub ttl: Duration,
    /// Store key for the record-list envelope.
    pub envelope_key: String,
    /// Store key for the lifecycle marker.
    pub marker_key: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            envelope_key: ENVELOPE_KEY.to_string(),
            marker_key: MARKER_KEY.to_string(),
        }
    }
}

impl SyncConfig {
    /// Override the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override both store keys (for hosts caching several feeds).
    pub fn with_keys(mut self, envelope_key: impl Into<String>, marker_key: impl Into<String>) -> Self {
        self.envelope_key = envelope_key.into();
        self.marker_key = marker_key.into();
        self
    }
}
