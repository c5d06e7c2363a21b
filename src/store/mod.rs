// Persistent cache store boundary.
// The synchronizer treats persistence as an opaque async key-value store.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// Opaque async key-value store backing the cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the raw value for a key; absent if never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write the raw value for a key, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
