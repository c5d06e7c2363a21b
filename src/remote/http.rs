// HTTP page source.
// Fetches pages from a JSON collection endpoint of the form
// `{base}?page=N` returning `{ page, total_pages, data: [...] }`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{FeedError, Result};
use crate::record::Record;

use super::{PageBatch, PageSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire shape of a collection page.
#[derive(Debug, Deserialize)]
struct PageResponse {
    page: u32,
    total_pages: u32,
    data: Vec<Record>,
}

impl From<PageResponse> for PageBatch {
    fn from(body: PageResponse) -> Self {
        Self {
            has_more: body.page < body.total_pages,
            data: body.data,
        }
    }
}

/// Page source backed by an HTTP collection endpoint.
pub struct HttpPageSource {
    client: Client,
    base_url: String,
}

impl HttpPageSource {
    /// Source for the given endpoint, e.g. `https://example.com/api/users`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FeedError::Fetch)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Source reusing an existing client (shared pools, custom headers).
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: u32) -> Result<PageBatch> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(FeedError::Fetch)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body: PageResponse = response.json().await.map_err(FeedError::Fetch)?;
        Ok(body.into())
    }
}
