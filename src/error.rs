//! Crate-wide fatal error type.
//!
//! Per-URL failures encountered during a crawl (transport errors, non-2xx
//! responses, oversized bodies, parse failures) are not represented here —
//! they are recorded as strings on `CrawlResult::errors` and never abort the
//! crawl. `WebvouchError` covers only failures that make it impossible to
//! produce a `CrawlResult` at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebvouchError {
    #[error("failed to load configuration: {0}")]
    Config(String),

    #[error("seed links file not found: {0}")]
    SeedFileNotFound(std::path::PathBuf),

    #[error("origin URL could not be parsed: {0}")]
    InvalidOrigin(String),

    #[error("cache error: {0}")]
    Cache(#[from] sqlx::Error),

    #[error("cache I/O error: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("scheduler could not start: {0}")]
    SchedulerInit(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WebvouchError>;
