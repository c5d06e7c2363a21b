// Lifecycle monitoring.
// Persists a background marker and invalidates the cached record list
// on foreground when the app was away longer than the TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache;
use crate::config::SyncConfig;
use crate::store::CacheStore;

/// App execution state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foreground,
    Background,
}

/// Source of lifecycle transitions.
///
/// Injectable so the platform hookup (and tests) can drive the monitor
/// without a process-global listener.
pub trait LifecycleEvents: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent>;
}

/// Broadcast-backed event source. The host app emits transitions into
/// it from whatever platform hook it has.
#[derive(Debug, Clone)]
pub struct LifecycleChannel {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Emit a transition to all subscribers.
    /// Returns the number of receivers the event reached.
    pub fn emit(&self, event: LifecycleEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for LifecycleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleEvents for LifecycleChannel {
    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

/// Watches lifecycle transitions and expires the cached record list
/// when the app spent at least the TTL in the background.
pub struct LifecycleMonitor<S: CacheStore> {
    store: Arc<S>,
    ttl: Duration,
    envelope_key: String,
    marker_key: String,
}

impl<S: CacheStore> LifecycleMonitor<S> {
    pub fn new(store: Arc<S>, config: &SyncConfig) -> Self {
        Self {
            store,
            ttl: config.ttl,
            envelope_key: config.envelope_key.clone(),
            marker_key: config.marker_key.clone(),
        }
    }

    /// Drive the monitor from an event source.
    ///
    /// Runs one unconditional expiration check first, covering the
    /// case where the app was killed (not merely backgrounded) while
    /// expired. Returns when the event source is dropped.
    pub async fn run(&self, events: &dyn LifecycleEvents) {
        let mut rx = events.subscribe();
        self.check_expiration().await;

        loop {
            match rx.recv().await {
                Ok(event) => self.handle(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "lifecycle events lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Apply a single transition.
    pub async fn handle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Background => self.persist_marker().await,
            LifecycleEvent::Foreground => self.check_expiration().await,
        }
    }

    /// Record the instant the app left the foreground.
    ///
    /// A lost marker only risks a missed invalidation; displayed data
    /// is still re-validated against the envelope timestamp on the
    /// next load.
    async fn persist_marker(&self) {
        let millis = Utc::now().timestamp_millis().to_string();
        if let Err(err) = self.store.set(&self.marker_key, &millis).await {
            warn!(key = %self.marker_key, %err, "failed to persist background marker");
        }
    }

    /// Clear the envelope when the time since the last background
    /// transition reached the TTL. The marker is left in place.
    pub async fn check_expiration(&self) {
        let raw = match self.store.get(&self.marker_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                debug!(key = %self.marker_key, %err, "marker read failed, skipping check");
                return;
            }
        };

        let Ok(marker_millis) = raw.trim().parse::<i64>() else {
            debug!(key = %self.marker_key, "malformed background marker, skipping check");
            return;
        };

        let elapsed = Utc::now().timestamp_millis().saturating_sub(marker_millis);
        if elapsed >= self.ttl.as_millis() as i64 {
            debug!(elapsed_ms = elapsed, "cache expired while backgrounded, clearing");
            cache::clear(self.store.as_ref(), &self.envelope_key).await;
        }
    }
}
