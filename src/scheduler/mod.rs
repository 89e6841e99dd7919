//! Crawl Scheduler: BFS over candidate URLs with per-host serialization and
//! bounded global concurrency. The global queue, visited/scheduled sets,
//! parent/pivot maps, and evidence/error lists all live on the stack of
//! [`run`] and are mutated only after a task completes — spawned fetch
//! futures return data, never reach back into scheduler state themselves.

pub mod circuit_breaker;
pub mod domain_limiter;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use scraper::Html;
use url::Url;

use crate::cache::{CacheEntry, HtmlCache};
use crate::config::CrawlConfig;
use crate::evidence::{self, EvidenceIds, EvidenceRecord};
use crate::extract::{self, LinkElement};
use crate::fetch::{FetchBackend, FetchResponse};
use crate::normalize;
use crate::policy::CompiledPolicy;
use circuit_breaker::CircuitBreaker;
use domain_limiter::DomainLimiter;

struct QueueItem {
    url: Url,
    normalized: String,
    hops: u32,
}

enum TaskOutcome {
    /// Blocked by the blacklist gate or the hop limit — not an error.
    Rejected,
    Failed(String),
    Success {
        response: FetchResponse,
        links: Vec<LinkElement>,
    },
}

struct TaskResult {
    item: QueueItem,
    domain: String,
    outcome: TaskOutcome,
}

/// Accumulated evidence and per-URL errors from one full crawl.
pub struct ScheduleOutcome {
    pub evidence: Vec<EvidenceRecord>,
    pub errors: Vec<String>,
}

/// Runs one BFS crawl from `origin` to completion.
///
/// `seed_urls`, when non-empty, replace hop-0 discovery: the origin is
/// marked visited up front and every seed is enqueued at hop 1, per
/// the seeding rule.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    origin: &Url,
    origin_normalized: &str,
    seed_urls: &[String],
    cfg: &CrawlConfig,
    policy: &CompiledPolicy,
    cache: &HtmlCache,
    fetcher: &Arc<dyn FetchBackend>,
) -> ScheduleOutcome {
    let mut queue: VecDeque<QueueItem> = VecDeque::new();
    let mut scheduled: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut parent: HashMap<String, String> = HashMap::new();
    let mut pivot_confirmed: HashSet<String> = HashSet::new();
    let mut pivot_outlinks: HashMap<String, HashSet<String>> = HashMap::new();

    let mut evidence: Vec<EvidenceRecord> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    let mut ids = EvidenceIds::new();

    if seed_urls.is_empty() {
        queue.push_back(QueueItem {
            url: origin.clone(),
            normalized: origin_normalized.to_string(),
            hops: 0,
        });
        scheduled.insert(origin_normalized.to_string());
    } else {
        visited.insert(origin_normalized.to_string());
        for seed in seed_urls {
            let Some(seed_url) = normalize::resolve(seed, None) else {
                continue;
            };
            let Some(seed_normalized) = normalize::normalize(seed, None) else {
                continue;
            };
            if scheduled.contains(&seed_normalized) {
                continue;
            }
            scheduled.insert(seed_normalized.clone());
            queue.push_back(QueueItem {
                url: seed_url,
                normalized: seed_normalized,
                hops: 1,
            });
        }
    }

    let domain_limiter = DomainLimiter::new(1);
    let circuit_breaker = cfg
        .circuit_breaker_enabled
        .then(|| CircuitBreaker::new(5, 2, Duration::from_secs(30)));

    let mut host_waiters: HashMap<String, VecDeque<QueueItem>> = HashMap::new();
    let mut busy_hosts: HashSet<String> = HashSet::new();
    let mut in_flight = FuturesUnordered::new();

    loop {
        // Drain the global queue, admitting into the worker pool any item
        // whose host is currently free, staging the rest as per-host
        // waiters.
        while in_flight.len() < cfg.max_global_concurrency.max(1) {
            let Some(item) = queue.pop_front() else {
                break;
            };
            let domain = item.url.host_str().unwrap_or_default().to_string();
            if busy_hosts.contains(&domain) {
                host_waiters.entry(domain).or_default().push_back(item);
                continue;
            }
            busy_hosts.insert(domain.clone());
            in_flight.push(process_one(
                item,
                domain,
                cfg,
                policy,
                cache,
                fetcher,
                circuit_breaker.as_ref(),
                &domain_limiter,
            ));
        }

        if in_flight.is_empty() {
            if queue.is_empty() && host_waiters.values().all(VecDeque::is_empty) {
                break;
            }
            // Nothing admissible and nothing in flight can only happen if
            // every queued item's host is busy, but nothing is actually
            // running — unreachable given the invariant that a busy host
            // always has exactly one in-flight task. Guard against an
            // infinite loop regardless.
            break;
        }

        let Some(result) = in_flight.next().await else {
            continue;
        };

        busy_hosts.remove(&result.domain);
        if let Some(waiting) = host_waiters.get_mut(&result.domain)
            && let Some(next) = waiting.pop_front()
        {
            busy_hosts.insert(result.domain.clone());
            in_flight.push(process_one(
                next,
                result.domain.clone(),
                cfg,
                policy,
                cache,
                fetcher,
                circuit_breaker.as_ref(),
                &domain_limiter,
            ));
        }

        handle_completion(
            result,
            origin,
            origin_normalized,
            cfg,
            policy,
            &mut queue,
            &mut scheduled,
            &mut visited,
            &mut parent,
            &mut pivot_confirmed,
            &mut pivot_outlinks,
            &mut evidence,
            &mut errors,
            &mut ids,
        );
    }

    ScheduleOutcome { evidence, errors }
}

/// Fetches and extracts links for one queue item. Touches no scheduler
/// state — it only reports what happened so the owning loop can decide
/// what to do next.
#[allow(clippy::too_many_arguments)]
async fn process_one(
    item: QueueItem,
    domain: String,
    cfg: &CrawlConfig,
    policy: &CompiledPolicy,
    cache: &HtmlCache,
    fetcher: &Arc<dyn FetchBackend>,
    circuit_breaker: Option<&CircuitBreaker>,
    domain_limiter: &DomainLimiter,
) -> TaskResult {
    if policy.blacklist_blocks(&item.url) {
        return TaskResult {
            item,
            domain,
            outcome: TaskOutcome::Rejected,
        };
    }
    if item.hops >= cfg.max_hops {
        return TaskResult {
            item,
            domain,
            outcome: TaskOutcome::Rejected,
        };
    }

    let _permit = domain_limiter.acquire(domain.clone()).await;

    if let Some(cb) = circuit_breaker
        && !cb.should_attempt(&domain)
    {
        let outcome = TaskOutcome::Failed(format!("circuit open for domain {domain}"));
        return TaskResult {
            item,
            domain,
            outcome,
        };
    }

    let cache_hit = match cache.get(&item.normalized).await {
        Ok(hit) => hit,
        Err(e) => {
            log::warn!("cache read failed for {}: {e}", item.normalized);
            None
        }
    };
    let response = match cache_hit {
        Some(entry) => Ok(entry_to_response(entry)),
        None => fetch_and_store(&item, cache, fetcher).await,
    };

    match response {
        Ok(response) => {
            if let Some(cb) = circuit_breaker {
                cb.record_success(&domain);
            }
            let document = Html::parse_document(&response.text);
            let links = extract::extract_links(&document);
            TaskResult {
                item,
                domain,
                outcome: TaskOutcome::Success { response, links },
            }
        }
        Err(message) => {
            if let Some(cb) = circuit_breaker {
                cb.record_failure(&domain, &message);
            }
            TaskResult {
                item,
                domain,
                outcome: TaskOutcome::Failed(message),
            }
        }
    }
}

async fn fetch_and_store(
    item: &QueueItem,
    cache: &HtmlCache,
    fetcher: &Arc<dyn FetchBackend>,
) -> Result<FetchResponse, String> {
    let response = fetcher
        .get(item.url.as_str())
        .await
        .map_err(|e| format!("{} -> {e}", item.url))?;

    let entry = CacheEntry {
        final_url: response.final_url.clone(),
        status: response.status,
        headers: response.headers.clone(),
        text: response.text.clone(),
        content_type: response.content_type.clone(),
    };
    if let Err(e) = cache.set_html_ok(&item.normalized, &entry).await {
        log::warn!("cache write failed for {}: {e}", item.normalized);
    }
    Ok(response)
}

fn entry_to_response(entry: CacheEntry) -> FetchResponse {
    FetchResponse {
        final_url: entry.final_url,
        status: entry.status,
        headers: entry.headers,
        text: entry.text,
        content_type: entry.content_type,
    }
}

/// Performs steps 4–7 of the per-URL processing contract and enqueues
/// whatever the policy engine admits next. The sole place scheduler state
/// is mutated.
#[allow(clippy::too_many_arguments)]
fn handle_completion(
    result: TaskResult,
    origin: &Url,
    origin_normalized: &str,
    cfg: &CrawlConfig,
    policy: &CompiledPolicy,
    queue: &mut VecDeque<QueueItem>,
    scheduled: &mut HashSet<String>,
    visited: &mut HashSet<String>,
    parent: &mut HashMap<String, String>,
    pivot_confirmed: &mut HashSet<String>,
    pivot_outlinks: &mut HashMap<String, HashSet<String>>,
    evidence: &mut Vec<EvidenceRecord>,
    errors: &mut Vec<String>,
    ids: &mut EvidenceIds,
) {
    let TaskResult { item, outcome, .. } = result;
    visited.insert(item.normalized.clone());

    let (response, links) = match outcome {
        TaskOutcome::Rejected => return,
        TaskOutcome::Failed(message) => {
            errors.push(message);
            return;
        }
        TaskOutcome::Success { response, links } => (response, links),
    };

    let current_url = Url::parse(&response.final_url).unwrap_or_else(|_| item.url.clone());

    let candidates = resolve_candidates(&current_url, &links);

    if item.normalized == origin_normalized {
        let survivors = policy.filter_outlinks(candidates, visited, scheduled);
        for (url, normalized) in survivors {
            try_enqueue(queue, scheduled, url, normalized, item.hops + 1);
        }
        return;
    }

    if let Some(element) = evidence::detect_backlink(&current_url, origin_normalized, &links) {
        let is_rel_me = element.rel.iter().any(|t| t == "me");
        if !cfg.only_rel_me || is_rel_me {
            let (kind, classification, trusted_surface) =
                evidence::classify(element, &current_url, &cfg.logic);
            evidence.push(evidence::make_evidence(
                ids,
                origin.as_str(),
                item.url.as_str(),
                element,
                classification,
                kind,
                trusted_surface,
                item.hops,
            ));
            pivot_confirmed.insert(item.normalized.clone());

            let neighbor_survivors =
                policy.filter_pivot_outlinks(candidates.clone(), visited, scheduled);
            let neighbors = pivot_outlinks.entry(item.normalized.clone()).or_default();
            for (url, normalized) in neighbor_survivors {
                neighbors.insert(normalized.clone());
                parent
                    .entry(normalized.clone())
                    .or_insert_with(|| item.normalized.clone());
                try_enqueue(queue, scheduled, url, normalized, item.hops + 1);
            }
        }
    }

    if !cfg.only_rel_me
        && let Some(pivot_normalized) = parent.get(&item.normalized).cloned()
        && pivot_confirmed.contains(&pivot_normalized)
        && evidence::detect_backlink(&current_url, &pivot_normalized, &links).is_some()
    {
        evidence.push(evidence::make_indirect_evidence(
            ids,
            origin.as_str(),
            &pivot_normalized,
            item.url.as_str(),
            item.hops,
        ));
    }
}

fn try_enqueue(
    queue: &mut VecDeque<QueueItem>,
    scheduled: &mut HashSet<String>,
    url: Url,
    normalized: String,
    hops: u32,
) {
    if scheduled.contains(&normalized) {
        return;
    }
    scheduled.insert(normalized.clone());
    queue.push_back(QueueItem {
        url,
        normalized,
        hops,
    });
}

fn resolve_candidates(current_url: &Url, links: &[LinkElement]) -> Vec<(Url, String)> {
    links
        .iter()
        .filter_map(|el| {
            let url = normalize::resolve(&el.href, Some(current_url))?;
            let normalized = normalize::normalize(&el.href, Some(current_url))?;
            Some((url, normalized))
        })
        .collect()
}
