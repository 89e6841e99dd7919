//! The primary, programmer-facing entry point: `crawl_and_score`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::HtmlCache;
use crate::config::{CrawlConfig, CrawlOverrides};
use crate::error::{Result, WebvouchError};
use crate::evidence::EvidenceRecord;
use crate::fetch::{FetchBackend, HeadlessFetcher, HttpFetcher};
use crate::normalize;
use crate::policy::CompiledPolicy;
use crate::scheduler;
use crate::scoring::{self, ScoreLabel};

/// The crawl's final, serializable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub origin_url: String,
    pub score: u8,
    pub label: ScoreLabel,
    pub evidence: Vec<EvidenceRecord>,
    pub errors: Vec<String>,
}

/// Call-site overrides accepted directly by `crawl_and_score`, distinct
/// from [`CrawlOverrides`] only in that `trusted_overrides` /
/// `blacklist_overrides` / `whitelist_overrides` here are *additions* to
/// the merged config's lists rather than replacements, mirroring
/// `naive_backlink/api.py`'s `config["trusted"].extend(...)` semantics.
#[derive(Debug, Clone, Default)]
pub struct CrawlAndScoreOverrides {
    pub trusted_overrides: Vec<String>,
    pub blacklist_overrides: Vec<String>,
    pub whitelist_overrides: Vec<String>,
    pub max_hops: Option<u32>,
    pub only_whitelist: Option<bool>,
    pub only_rel_me: Option<bool>,
}

/// Crawls from `origin_url` for mutual backlinks and reduces the collected
/// evidence to a bounded score. Two-stage: the lightweight HTTP backend
/// runs first; if it yields zero evidence and `use_playwright_as_fallback`
/// is enabled, the crawl is retried from scratch with the headless
/// backend, discarding the first stage's errors.
pub async fn crawl_and_score(
    origin_url: &str,
    base_config: &CrawlConfig,
    seed_urls: &[String],
    overrides: &CrawlAndScoreOverrides,
) -> Result<CrawlResult> {
    log::info!("starting crawl and score for: {origin_url}");

    let origin = Url::parse(origin_url)
        .map_err(|e| WebvouchError::InvalidOrigin(format!("{origin_url}: {e}")))?;
    let origin_normalized = normalize::normalize(origin_url, None)
        .ok_or_else(|| WebvouchError::InvalidOrigin(origin_url.to_string()))?;

    let mut config = base_config.clone();
    config
        .logic
        .trusted_domains
        .extend(overrides.trusted_overrides.iter().cloned());
    config
        .logic
        .blacklist_patterns
        .extend(overrides.blacklist_overrides.iter().cloned());
    config
        .logic
        .whitelist_patterns
        .extend(overrides.whitelist_overrides.iter().cloned());
    let config = config.with_overrides(&CrawlOverrides {
        max_hops: overrides.max_hops,
        only_whitelist: overrides.only_whitelist,
        only_rel_me: overrides.only_rel_me,
        ..Default::default()
    });

    let policy = CompiledPolicy::new(config.logic.clone(), &origin);
    let cache = HtmlCache::open(&config.cache).await?;

    let timeout = Duration::from_secs_f64(config.timeout_secs);
    let http_fetcher: Arc<dyn FetchBackend> = Arc::new(HttpFetcher::new(
        &config.user_agent,
        timeout,
        config.max_redirects,
        config.max_content_bytes,
    ));

    log::info!("step 1: crawling with lightweight HTTP client");
    let mut outcome = scheduler::run(
        &origin,
        &origin_normalized,
        seed_urls,
        &config,
        &policy,
        &cache,
        &http_fetcher,
    )
    .await;

    if outcome.evidence.is_empty() && config.use_playwright_as_fallback {
        log::warn!("no evidence found with HTTP client, falling back to headless browser");
        let headless_fetcher: Arc<dyn FetchBackend> = Arc::new(HeadlessFetcher::new(timeout));
        outcome = scheduler::run(
            &origin,
            &origin_normalized,
            seed_urls,
            &config,
            &policy,
            &cache,
            &headless_fetcher,
        )
        .await;
    }

    cache.close().await;

    log::info!(
        "evidence collection complete: {} evidence records, {} errors",
        outcome.evidence.len(),
        outcome.errors.len()
    );

    let (score, label) = scoring::calculate_score(&outcome.evidence);
    log::info!("score calculated: {score} ({label:?})");

    Ok(CrawlResult {
        origin_url: origin_url.to_string(),
        score,
        label,
        evidence: outcome.evidence,
        errors: outcome.errors,
    })
}
