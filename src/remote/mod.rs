// Remote page source boundary.
// The synchronizer sees pagination as an opaque async fetch-by-page function.

mod http;

pub use http::HttpPageSource;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::Record;

/// One page of records plus the server's more-data hint.
#[derive(Debug, Clone, Default)]
pub struct PageBatch {
    /// Records in server order.
    pub data: Vec<Record>,
    /// Whether the server has pages beyond this one.
    pub has_more: bool,
}

/// Opaque async page fetcher.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the batch for a 1-based page number.
    async fn fetch_page(&self, page: u32) -> Result<PageBatch>;
}

#[async_trait]
impl<P: PageSource + ?Sized> PageSource for std::sync::Arc<P> {
    async fn fetch_page(&self, page: u32) -> Result<PageBatch> {
        self.as_ref().fetch_page(page).await
    }
}
