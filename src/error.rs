// Error types for the pagefeed library.
// Covers remote fetch, cache store, and serialization failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("remote fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("cache store error: {0}")]
    Store(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
