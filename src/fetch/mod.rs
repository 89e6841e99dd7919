//! Fetch Backend: a single capability interface with two interchangeable
//! implementations. The scheduler depends only on the trait.

mod headless;
mod http;

pub use headless::HeadlessFetcher;
pub use http::HttpFetcher;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub final_url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub text: String,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("non-200 status {0}")]
    HttpStatus(u16),
    #[error("non-html content type: {0}")]
    NonHtmlContentType(String),
    #[error("response body exceeded {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("backend error: {0}")]
    Backend(String),
}

/// The capability both fetch backends implement: fetch one URL and return
/// the cache-entry shape, or a typed failure. Neither variant aborts the
/// crawl on failure — the caller turns `Err` into an error-list entry.
///
/// Boxed-future return rather than `async-trait` keeps this object-safe
/// (the scheduler holds `Arc<dyn FetchBackend>`) without an extra macro
/// dependency.
pub trait FetchBackend: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResponse, FetchError>> + Send + 'a>>;
}
