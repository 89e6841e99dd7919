//! Policy Engine: decides, per candidate URL, whether it may be enqueued.

use std::collections::HashSet;
use url::Url;

use crate::config::{LogicConfig, SameDomainPolicy};
use crate::normalize;
use crate::pattern::PatternSet;

/// Precompiled pattern sets built once per crawl from the effective merged
/// blacklist/whitelist, per the "compile once at crawl start" design note.
pub struct CompiledPolicy {
    cfg: LogicConfig,
    blacklist: PatternSet,
    whitelist: PatternSet,
    origin_registrable: String,
    origin_host: String,
}

impl CompiledPolicy {
    #[must_use]
    pub fn new(cfg: LogicConfig, origin: &Url) -> Self {
        let blacklist = PatternSet::compile(cfg.blacklist_patterns.iter());
        let whitelist = PatternSet::compile(cfg.whitelist_patterns.iter());
        let origin_host = origin.host_str().unwrap_or_default().to_string();
        let origin_registrable =
            normalize::registrable_or_host(&origin_host, cfg.use_registrable_domain);
        Self {
            cfg,
            blacklist,
            whitelist,
            origin_registrable,
            origin_host,
        }
    }

    /// Pre-network gate applied before a candidate is ever fetched: policy
    /// rules that don't depend on the visited/queued sets. Same rules as
    /// `blocks` minus the batch-local dedup, so callers can reject a seed or
    /// a freshly-discovered URL before it reaches the scheduler's queue.
    #[must_use]
    pub fn blacklist_blocks(&self, candidate: &Url) -> bool {
        if !normalize::is_fetchable(candidate) {
            return true;
        }
        if !normalize::has_html_like_path(candidate) {
            return true;
        }
        if self.cfg.only_whitelist && !self.whitelist.matches(candidate) {
            return true;
        }
        if !self.cfg.only_whitelist && self.blacklist.matches(candidate) {
            return true;
        }
        false
    }

    /// True if `candidate` is blocked from enqueuing given everything
    /// already known about this batch: the already-visited set, the
    /// already-queued set, and the URLs chosen earlier in this same batch.
    #[must_use]
    pub fn blocks(
        &self,
        candidate: &Url,
        candidate_normalized: &str,
        visited: &HashSet<String>,
        queued: &HashSet<String>,
        chosen_this_batch: &HashSet<String>,
    ) -> bool {
        if !normalize::is_fetchable(candidate) {
            return true;
        }
        if !normalize::has_html_like_path(candidate) {
            return true;
        }
        if self.cfg.only_whitelist && !self.whitelist.matches(candidate) {
            return true;
        }
        if !self.cfg.only_whitelist && self.blacklist.matches(candidate) {
            return true;
        }
        if self.same_domain_blocked(candidate) {
            return true;
        }
        if visited.contains(candidate_normalized)
            || queued.contains(candidate_normalized)
            || chosen_this_batch.contains(candidate_normalized)
        {
            return true;
        }
        false
    }

    fn same_domain_blocked(&self, candidate: &Url) -> bool {
        let Some(host) = candidate.host_str() else {
            return false;
        };
        match self.cfg.same_domain_policy {
            SameDomainPolicy::Follow => false,
            SameDomainPolicy::NoSelfDomain => host.eq_ignore_ascii_case(&self.origin_host),
            SameDomainPolicy::NoSelfDomainOrSubdomain => {
                let candidate_registrable =
                    normalize::registrable_or_host(host, self.cfg.use_registrable_domain);
                candidate_registrable == self.origin_registrable
                    || host.ends_with(&format!(".{}", self.origin_registrable))
            }
        }
    }

    /// Filters and truncates `candidates` to at most `max_outlinks`
    /// survivors, in document order, tracking which URLs are chosen within
    /// this same batch so duplicates inside one page's link list collapse.
    #[must_use]
    pub fn filter_outlinks(
        &self,
        candidates: Vec<(Url, String)>,
        visited: &HashSet<String>,
        queued: &HashSet<String>,
    ) -> Vec<(Url, String)> {
        let mut chosen = HashSet::new();
        let mut survivors = Vec::new();
        for (url, normalized) in candidates {
            if survivors.len() >= self.cfg.max_outlinks {
                break;
            }
            if self.blocks(&url, &normalized, visited, queued, &chosen) {
                continue;
            }
            chosen.insert(normalized.clone());
            survivors.push((url, normalized));
        }
        survivors
    }

    /// Filters second-hop candidates discovered on a pivot page. Unlike
    /// `filter_outlinks`, this never applies the same-domain policy — a
    /// pivot is expected to link back into the origin's neighborhood, and
    /// indirect evidence depends on exactly that. It only excludes links
    /// back to the origin host itself, since those would just rediscover
    /// the origin rather than a neighbor candidate.
    #[must_use]
    pub fn filter_pivot_outlinks(
        &self,
        candidates: Vec<(Url, String)>,
        visited: &HashSet<String>,
        queued: &HashSet<String>,
    ) -> Vec<(Url, String)> {
        let mut chosen = HashSet::new();
        let mut survivors = Vec::new();
        for (url, normalized) in candidates {
            if survivors.len() >= self.cfg.max_outlinks {
                break;
            }
            if url.host_str() == Some(self.origin_host.as_str()) {
                continue;
            }
            if self.blacklist_blocks(&url) {
                continue;
            }
            if visited.contains(&normalized)
                || queued.contains(&normalized)
                || chosen.contains(&normalized)
            {
                continue;
            }
            chosen.insert(normalized.clone());
            survivors.push((url, normalized));
        }
        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(cfg: LogicConfig, origin: &str) -> CompiledPolicy {
        CompiledPolicy::new(cfg, &Url::parse(origin).unwrap())
    }

    #[test]
    fn blocks_non_html_extension() {
        let p = policy(LogicConfig::default(), "https://origin.example/");
        let candidate = Url::parse("https://other.example/file.pdf").unwrap();
        assert!(p.blocks(&candidate, "https://other.example/file.pdf", &Default::default(), &Default::default(), &Default::default()));
    }

    #[test]
    fn default_blacklist_blocks_github_sponsors() {
        let p = policy(LogicConfig::default(), "https://origin.example/");
        let candidate = Url::parse("https://github.com/sponsors/pypa").unwrap();
        assert!(p.blocks(&candidate, "https://github.com/sponsors/pypa", &Default::default(), &Default::default(), &Default::default()));
    }

    #[test]
    fn default_blacklist_allows_user_repo() {
        let p = policy(LogicConfig::default(), "https://origin.example/");
        let candidate = Url::parse("https://github.com/pypa/pip").unwrap();
        assert!(!p.blocks(&candidate, "https://github.com/pypa/pip", &Default::default(), &Default::default(), &Default::default()));
    }

    #[test]
    fn same_domain_or_subdomain_blocks_both() {
        let p = policy(LogicConfig::default(), "https://origin.example/");
        let sub = Url::parse("https://sub.origin.example/child").unwrap();
        let exact = Url::parse("https://origin.example/self").unwrap();
        let other = Url::parse("https://other.example/x").unwrap();
        assert!(p.same_domain_blocked(&sub));
        assert!(p.same_domain_blocked(&exact));
        assert!(!p.same_domain_blocked(&other));
    }

    #[test]
    fn no_self_domain_blocks_only_exact_host_not_subdomain() {
        let mut cfg = LogicConfig::default();
        cfg.same_domain_policy = SameDomainPolicy::NoSelfDomain;
        let p = policy(cfg, "https://origin.example/");
        let exact = Url::parse("https://origin.example/self").unwrap();
        let sub = Url::parse("https://sub.origin.example/child").unwrap();
        assert!(p.same_domain_blocked(&exact));
        assert!(!p.same_domain_blocked(&sub));
    }

    #[test]
    fn only_whitelist_mode_blocks_unmatched() {
        let mut cfg = LogicConfig::default();
        cfg.only_whitelist = true;
        let p = policy(cfg, "https://origin.example/");
        let candidate = Url::parse("https://random-blog.example/post").unwrap();
        assert!(p.blocks(&candidate, "https://random-blog.example/post", &Default::default(), &Default::default(), &Default::default()));
        let whitelisted = Url::parse("https://github.com/someone").unwrap();
        assert!(!p.blocks(&whitelisted, "https://github.com/someone", &Default::default(), &Default::default(), &Default::default()));
    }

    #[test]
    fn outlink_cap_truncates_deterministically() {
        let mut cfg = LogicConfig::default();
        cfg.max_outlinks = 2;
        cfg.blacklist_patterns.clear();
        let p = policy(cfg, "https://origin.example/");
        let candidates: Vec<_> = (0..5)
            .map(|i| {
                let url = Url::parse(&format!("https://other.example/p{i}")).unwrap();
                let normalized = url.as_str().to_string();
                (url, normalized)
            })
            .collect();
        let survivors = p.filter_outlinks(candidates, &Default::default(), &Default::default());
        assert_eq!(survivors.len(), 2);
        assert!(survivors[0].1.ends_with("p0"));
        assert!(survivors[1].1.ends_with("p1"));
    }

    #[test]
    fn pivot_outlinks_ignore_same_domain_policy() {
        let p = policy(LogicConfig::default(), "https://origin.example/");
        let candidate = Url::parse("https://sub.origin.example/child").unwrap();
        let survivors = p.filter_pivot_outlinks(
            vec![(candidate.clone(), candidate.as_str().to_string())],
            &Default::default(),
            &Default::default(),
        );
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn pivot_outlinks_exclude_origin_host() {
        let p = policy(LogicConfig::default(), "https://origin.example/");
        let back_to_origin = Url::parse("https://origin.example/other-page").unwrap();
        let survivors = p.filter_pivot_outlinks(
            vec![(
                back_to_origin.clone(),
                back_to_origin.as_str().to_string(),
            )],
            &Default::default(),
            &Default::default(),
        );
        assert!(survivors.is_empty());
    }

    #[test]
    fn blacklist_blocks_matches_pre_network_rules() {
        let p = policy(LogicConfig::default(), "https://origin.example/");
        let sponsors = Url::parse("https://github.com/sponsors/pypa").unwrap();
        assert!(p.blacklist_blocks(&sponsors));
        let ok = Url::parse("https://github.com/pypa/pip").unwrap();
        assert!(!p.blacklist_blocks(&ok));
    }
}
