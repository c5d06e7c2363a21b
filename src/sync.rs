// Sync controller.
// Core state machine: accumulated records, page cursor, and transient
// flags; orchestrates cache read/write, fetch, and append.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::cache::{self, Envelope};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::record::Record;
use crate::remote::PageSource;
use crate::store::CacheStore;

/// What a load operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Served n records from a fresh cache envelope; no network call.
    Cached(usize),
    /// Appended n records fetched from the remote source.
    Fetched(usize),
    /// A fetch is already in flight; no new fetch was issued.
    AlreadyLoading,
    /// The server reported the feed exhausted; no fetch was issued.
    Exhausted,
}

/// Per-session working set. Never persisted; only the cache envelope is.
#[derive(Debug)]
struct SyncState {
    /// Accumulated records, append-only within a session.
    records: Vec<Record>,
    /// Current page cursor, 1-based.
    page: u32,
    loading: bool,
    refreshing: bool,
    /// Set once the server reports no further pages.
    exhausted: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            page: 1,
            loading: false,
            refreshing: false,
            exhausted: false,
        }
    }
}

/// Copy of the sync state for the presentation layer.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub records: Vec<Record>,
    pub page: u32,
    pub loading: bool,
    pub refreshing: bool,
    pub exhausted: bool,
}

/// Synchronizes a paginated remote feed into an in-memory record list,
/// backed by a time-bounded cache envelope.
///
/// Only one fetch may be pending at a time: operations invoked while
/// `loading` or `refreshing` return [`LoadOutcome::AlreadyLoading`]
/// instead of racing, so rapid scroll or refresh triggers cannot
/// double-append a page.
pub struct SyncController<S: CacheStore, P: PageSource> {
    store: Arc<S>,
    source: P,
    config: SyncConfig,
    // Guarded state transitions; the lock is never held across an await.
    state: Mutex<SyncState>,
}

impl<S: CacheStore, P: PageSource> SyncController<S, P> {
    pub fn new(store: Arc<S>, source: P, config: SyncConfig) -> Self {
        Self {
            store,
            source,
            config,
            state: Mutex::new(SyncState::default()),
        }
    }

    /// Accumulated records, in fetch order.
    pub fn records(&self) -> Vec<Record> {
        self.state.lock().unwrap().records.clone()
    }

    /// Current page cursor.
    pub fn page(&self) -> u32 {
        self.state.lock().unwrap().page
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().unwrap().refreshing
    }

    /// Whether the server reported no further pages.
    pub fn is_exhausted(&self) -> bool {
        self.state.lock().unwrap().exhausted
    }

    /// Full state copy for rendering.
    pub fn snapshot(&self) -> SyncSnapshot {
        let state = self.state.lock().unwrap();
        SyncSnapshot {
            records: state.records.clone(),
            page: state.page,
            loading: state.loading,
            refreshing: state.refreshing,
            exhausted: state.exhausted,
        }
    }

    /// First load of a session.
    ///
    /// A non-expired cache envelope is served without touching the
    /// network; an expired one is cleared first and page 1 fetched.
    pub async fn initial_load(&self) -> Result<LoadOutcome> {
        let page = {
            let mut state = self.state.lock().unwrap();
            if state.loading || state.refreshing {
                return Ok(LoadOutcome::AlreadyLoading);
            }
            // Claim the in-flight slot before the first suspension point.
            state.loading = true;
            state.page
        };

        if let Some(envelope) = cache::load(self.store.as_ref(), &self.config.envelope_key).await {
            if !envelope.is_expired(Utc::now(), self.config.ttl) {
                debug!(records = envelope.data.len(), "serving initial load from cache");
                let mut state = self.state.lock().unwrap();
                state.records = envelope.data;
                state.loading = false;
                return Ok(LoadOutcome::Cached(state.records.len()));
            }
            debug!("cache envelope expired, clearing before fetch");
            cache::clear(self.store.as_ref(), &self.config.envelope_key).await;
        }

        self.fetch_page(page).await
    }

    /// Load the next page, appending to the accumulated records.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let next = {
            let mut state = self.state.lock().unwrap();
            if state.loading || state.refreshing {
                return Ok(LoadOutcome::AlreadyLoading);
            }
            if state.exhausted {
                return Ok(LoadOutcome::Exhausted);
            }
            state.page += 1;
            state.loading = true;
            state.page
        };

        self.fetch_page(next).await
    }

    /// Pull-to-refresh.
    ///
    /// Advances the cursor and appends, exactly like `load_more`, with
    /// the `refreshing` flag set instead of `loading`. This reproduces
    /// the reference behavior where refresh loads the next page rather
    /// than restarting from page 1.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let next = {
            let mut state = self.state.lock().unwrap();
            if state.loading || state.refreshing {
                return Ok(LoadOutcome::AlreadyLoading);
            }
            if state.exhausted {
                return Ok(LoadOutcome::Exhausted);
            }
            state.page += 1;
            state.refreshing = true;
            state.page
        };

        self.fetch_page(next).await
    }

    /// Fetch one page and fold it into the state.
    ///
    /// On success the entire accumulated sequence is re-persisted with
    /// a fresh timestamp. On failure the records and cursor are left
    /// untouched and the transient flags reset; the cache is never
    /// cleared by a failed fetch.
    async fn fetch_page(&self, page: u32) -> Result<LoadOutcome> {
        match self.source.fetch_page(page).await {
            Ok(batch) => {
                let (all_records, appended) = {
                    let mut state = self.state.lock().unwrap();
                    let appended = batch.data.len();
                    state.records.extend(batch.data);
                    if !batch.has_more {
                        debug!(page, "server reported feed exhausted");
                        state.exhausted = true;
                    }
                    state.loading = false;
                    state.refreshing = false;
                    (state.records.clone(), appended)
                };

                let envelope = Envelope::now(all_records);
                if let Err(err) =
                    cache::save(self.store.as_ref(), &self.config.envelope_key, &envelope).await
                {
                    warn!(%err, "failed to persist cache envelope");
                }

                Ok(LoadOutcome::Fetched(appended))
            }
            Err(err) => {
                error!(page, %err, "page fetch failed");
                let mut state = self.state.lock().unwrap();
                state.loading = false;
                state.refreshing = false;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::remote::PageBatch;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn record(id: u64) -> Record {
        serde_json::from_value(json!({ "id": id, "name": format!("user {id}") })).unwrap()
    }

    fn batch(ids: &[u64], has_more: bool) -> PageBatch {
        PageBatch {
            data: ids.iter().copied().map(record).collect(),
            has_more,
        }
    }

    /// Serves pre-canned pages (index 0 is page 1) and records calls.
    struct MockSource {
        pages: Vec<PageBatch>,
        calls: Mutex<Vec<u32>>,
        fail: AtomicBool,
    }

    impl MockSource {
        fn new(pages: Vec<PageBatch>) -> Arc<Self> {
            Arc::new(Self {
                pages,
                calls: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for MockSource {
        async fn fetch_page(&self, page: u32) -> Result<PageBatch> {
            self.calls.lock().unwrap().push(page);
            if self.fail.load(Ordering::Relaxed) {
                return Err(FeedError::Other("simulated fetch failure".to_string()));
            }
            Ok(self
                .pages
                .get((page - 1) as usize)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn controller(
        store: Arc<MemoryStore>,
        source: Arc<MockSource>,
    ) -> SyncController<MemoryStore, Arc<MockSource>> {
        SyncController::new(store, source, SyncConfig::default())
    }

    async fn seed_envelope(store: &MemoryStore, envelope: &Envelope) {
        cache::save(store, "feed_records", envelope).await.unwrap();
    }

    #[tokio::test]
    async fn test_fresh_cache_serves_without_network() {
        let store = Arc::new(MemoryStore::new());
        seed_envelope(&store, &Envelope::now(vec![record(1), record(2)])).await;

        let source = MockSource::new(vec![batch(&[9], true)]);
        let ctrl = controller(store, source.clone());

        let outcome = ctrl.initial_load().await.unwrap();

        assert_eq!(outcome, LoadOutcome::Cached(2));
        assert_eq!(ctrl.records(), vec![record(1), record(2)]);
        assert!(source.calls().is_empty());
        assert!(!ctrl.is_loading());
    }

    #[tokio::test]
    async fn test_absent_cache_fetches_page_one() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new(vec![batch(&[1, 2], true)]);
        let ctrl = controller(store.clone(), source.clone());

        let outcome = ctrl.initial_load().await.unwrap();

        assert_eq!(outcome, LoadOutcome::Fetched(2));
        assert_eq!(source.calls(), vec![1]);
        assert_eq!(ctrl.records(), vec![record(1), record(2)]);

        // The persisted envelope holds exactly the fetched batch.
        let envelope = cache::load(store.as_ref(), "feed_records").await.unwrap();
        assert_eq!(envelope.data, vec![record(1), record(2)]);
    }

    #[tokio::test]
    async fn test_expired_cache_is_cleared_and_refetched() {
        // TTL 45 min; cache holds 20 records stamped 50 minutes ago.
        let store = Arc::new(MemoryStore::new());
        let stale = Envelope {
            data: (1..=20).map(record).collect(),
            timestamp: Utc::now() - chrono::Duration::minutes(50),
        };
        seed_envelope(&store, &stale).await;

        let source = MockSource::new(vec![batch(&[100, 101], true)]);
        let ctrl = controller(store.clone(), source.clone());

        let outcome = ctrl.initial_load().await.unwrap();

        assert_eq!(outcome, LoadOutcome::Fetched(2));
        assert_eq!(source.calls(), vec![1]);
        assert_eq!(ctrl.records(), vec![record(100), record(101)]);

        // Envelope was rewritten with the fetched batch and a fresh timestamp.
        let envelope = cache::load(store.as_ref(), "feed_records").await.unwrap();
        assert_eq!(envelope.data, vec![record(100), record(101)]);
        assert!(!envelope.is_expired(Utc::now(), Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_load_more_appends_next_page() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new(vec![batch(&[1, 2], true), batch(&[3, 4], true)]);
        let ctrl = controller(store.clone(), source.clone());

        ctrl.initial_load().await.unwrap();
        let outcome = ctrl.load_more().await.unwrap();

        assert_eq!(outcome, LoadOutcome::Fetched(2));
        assert_eq!(source.calls(), vec![1, 2]);
        assert_eq!(ctrl.page(), 2);
        assert_eq!(ctrl.records(), vec![record(1), record(2), record(3), record(4)]);

        // The envelope always holds the entire accumulated sequence.
        let envelope = cache::load(store.as_ref(), "feed_records").await.unwrap();
        assert_eq!(envelope.data.len(), 4);
    }

    #[tokio::test]
    async fn test_refresh_advances_cursor() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new(vec![batch(&[1], true), batch(&[2], true)]);
        let ctrl = controller(store, source.clone());

        ctrl.initial_load().await.unwrap();
        let outcome = ctrl.refresh().await.unwrap();

        // Refresh loads the next page; it does not reset to page 1.
        assert_eq!(outcome, LoadOutcome::Fetched(1));
        assert_eq!(source.calls(), vec![1, 2]);
        assert_eq!(ctrl.page(), 2);
        assert_eq!(ctrl.records(), vec![record(1), record(2)]);
        assert!(!ctrl.is_refreshing());
    }

    #[tokio::test]
    async fn test_failed_fetch_preserves_state() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new(vec![batch(&[1, 2], true)]);
        let ctrl = controller(store.clone(), source.clone());

        ctrl.initial_load().await.unwrap();

        source.fail.store(true, Ordering::Relaxed);
        let result = ctrl.load_more().await;

        assert!(result.is_err());
        assert_eq!(ctrl.records(), vec![record(1), record(2)]);
        assert!(!ctrl.is_loading());
        assert!(!ctrl.is_refreshing());

        // The cursor is not rolled back; the envelope is untouched.
        assert_eq!(ctrl.page(), 2);
        let envelope = cache::load(store.as_ref(), "feed_records").await.unwrap();
        assert_eq!(envelope.data, vec![record(1), record(2)]);

        // The next load_more simply tries the following cursor.
        source.fail.store(false, Ordering::Relaxed);
        ctrl.load_more().await.unwrap();
        assert_eq!(source.calls(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_exhausted_feed_stops_pagination() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new(vec![batch(&[1], false)]);
        let ctrl = controller(store, source.clone());

        ctrl.initial_load().await.unwrap();
        assert!(ctrl.is_exhausted());

        assert_eq!(ctrl.load_more().await.unwrap(), LoadOutcome::Exhausted);
        assert_eq!(ctrl.refresh().await.unwrap(), LoadOutcome::Exhausted);
        assert_eq!(source.calls(), vec![1]);
        assert_eq!(ctrl.page(), 1);
    }

    #[tokio::test]
    async fn test_append_never_dedupes() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new(vec![batch(&[1, 2], true), batch(&[2, 1], true)]);
        let ctrl = controller(store, source);

        ctrl.initial_load().await.unwrap();
        ctrl.load_more().await.unwrap();

        assert_eq!(ctrl.records().len(), 4);
    }

    #[tokio::test]
    async fn test_envelope_write_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new(vec![batch(&[1], true)]);
        let ctrl = controller(store.clone(), source);

        store.fail_writes(true);
        let outcome = ctrl.initial_load().await.unwrap();

        // The fetch itself succeeds; only the cache stays stale.
        assert_eq!(outcome, LoadOutcome::Fetched(1));
        assert_eq!(ctrl.records(), vec![record(1)]);
    }

    /// Blocks inside fetch_page until released, to hold a fetch in flight.
    struct GatedSource {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl PageSource for GatedSource {
        async fn fetch_page(&self, _page: u32) -> Result<PageBatch> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(batch(&[1], true))
        }
    }

    #[tokio::test]
    async fn test_overlapping_operations_are_rejected() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = GatedSource {
            started: started.clone(),
            release: release.clone(),
        };
        let ctrl = Arc::new(SyncController::new(
            Arc::new(MemoryStore::new()),
            source,
            SyncConfig::default(),
        ));

        let background = ctrl.clone();
        let pending = tokio::spawn(async move { background.load_more().await });
        started.notified().await;

        assert!(ctrl.is_loading());
        assert_eq!(ctrl.load_more().await.unwrap(), LoadOutcome::AlreadyLoading);
        assert_eq!(ctrl.refresh().await.unwrap(), LoadOutcome::AlreadyLoading);
        assert_eq!(ctrl.initial_load().await.unwrap(), LoadOutcome::AlreadyLoading);

        release.notify_one();
        let outcome = pending.await.unwrap().unwrap();

        // Exactly one page was appended.
        assert_eq!(outcome, LoadOutcome::Fetched(1));
        assert_eq!(ctrl.records().len(), 1);
        assert!(!ctrl.is_loading());
    }
}
