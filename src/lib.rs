// Client-side synchronizer for a paginated remote feed.
// Serves a list view from a time-bounded local cache, invalidated both
// by elapsed time and by app foreground/background transitions.

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod record;
pub mod remote;
pub mod store;
pub mod sync;

pub use cache::{DEFAULT_TTL, Envelope};
pub use config::SyncConfig;
pub use error::{FeedError, Result};
pub use lifecycle::{LifecycleChannel, LifecycleEvent, LifecycleEvents, LifecycleMonitor};
pub use record::Record;
pub use remote::{HttpPageSource, PageBatch, PageSource};
pub use store::{CacheStore, FileStore, MemoryStore};
pub use sync::{LoadOutcome, SyncController, SyncSnapshot};
