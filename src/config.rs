//! Typed configuration: built-in defaults deep-merged with a `[tool.webvouch]`
//! TOML table, then with call-site overrides. Each merge step returns a new
//! immutable value rather than mutating a shared config object in place.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, WebvouchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SameDomainPolicy {
    Follow,
    NoSelfDomain,
    NoSelfDomainOrSubdomain,
}

impl Default for SameDomainPolicy {
    fn default() -> Self {
        Self::NoSelfDomainOrSubdomain
    }
}

/// Policy-engine knobs, scoped separately from the crawl-global settings
/// because they are the inputs to `policy`/`pattern`, not to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicConfig {
    pub max_outlinks: usize,
    pub trusted_domains: Vec<String>,
    pub same_domain_policy: SameDomainPolicy,
    pub use_registrable_domain: bool,
    pub blacklist_patterns: Vec<String>,
    pub whitelist_patterns: Vec<String>,
    pub only_whitelist: bool,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            max_outlinks: 50,
            trusted_domains: Vec::new(),
            same_domain_policy: SameDomainPolicy::default(),
            use_registrable_domain: false,
            blacklist_patterns: default_blacklist(),
            whitelist_patterns: default_whitelist(),
            only_whitelist: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// `None` selects the OS-conventional per-app cache directory.
    pub directory: Option<PathBuf>,
    pub expire_seconds: u64,
    pub store_errors: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            expire_seconds: 24 * 3600,
            store_errors: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    #[serde(flatten)]
    pub logic: LogicConfig,
    pub max_hops: u32,
    pub timeout_secs: f64,
    pub user_agent: String,
    pub max_content_bytes: u64,
    pub only_rel_me: bool,
    pub cache: CacheConfig,
    pub max_global_concurrency: usize,
    pub max_redirects: usize,
    pub use_playwright_as_fallback: bool,
    pub circuit_breaker_enabled: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            logic: LogicConfig::default(),
            max_hops: 3,
            timeout_secs: 10.0,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36"
                .to_string(),
            max_content_bytes: 1_048_576,
            only_rel_me: false,
            cache: CacheConfig::default(),
            max_global_concurrency: 8,
            max_redirects: 5,
            use_playwright_as_fallback: false,
            circuit_breaker_enabled: false,
        }
    }
}

fn default_whitelist() -> Vec<String> {
    [
        "github.com/*",
        "*.github.io/*",
        "gitlab.com/*",
        "*.gitlab.io/*",
        "keybase.io/*",
        "linkedin.com/in/*",
        "twitter.com/*",
        "x.com/*",
        "facebook.com/*",
        "mastodon.social/*",
        "*.m.wikipedia.org/*",
        "*.wikipedia.org/*",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_blacklist() -> Vec<String> {
    [
        "joinmastodon.org/*",
        "*.joinmastodon.org/*",
        "github.com/sponsors/*",
        "github.com/trending/*",
        "github.com/readme/*",
        "github.com/topics/*",
        "github.com/collections/*",
        "github.com/partners/*",
        "github.com/solutions",
        "github.com/solutions/*",
        "github.com/site",
        "github.com/site/*",
        "github.com/features",
        "github.com/features/*",
        "github.com/enterprise",
        "github.com/enterprise/*",
        "github.com/resources",
        "github.com/resources/*",
        "github.com/marketplace",
        "skills.github.com",
        "*.stackoverflow.co/*",
        "stackoverflow.co",
        "stackoverflow.co/*",
        "stackoverflow.blog*",
        "api.stackexchange.com",
        "data.stackexchange.com",
        "stackoverflow.com/users/signup*",
        "*.forem.com",
        "twitter.com/*",
        "x.com/*",
        "www.linkedin.com/*",
        "linkedin.com/*",
        "reddit.com/*",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Call-site overrides passed to `crawl_and_score`. Every field is optional;
/// `None` leaves the merged (defaults + file) value untouched.
#[derive(Debug, Clone, Default)]
pub struct CrawlOverrides {
    pub trusted_domains: Option<Vec<String>>,
    pub blacklist_patterns: Option<Vec<String>>,
    pub whitelist_patterns: Option<Vec<String>>,
    pub max_hops: Option<u32>,
    pub only_whitelist: Option<bool>,
    pub only_rel_me: Option<bool>,
}

impl CrawlConfig {
    /// Defaults deep-merged with a `[tool.webvouch]` table read from
    /// `toml_source`, if any keys are present there. Unknown keys in the
    /// table are ignored by `serde`'s normal deserialization behavior.
    pub fn load_from_toml(toml_source: &str) -> Result<Self> {
        #[derive(Deserialize, Default)]
        struct Wrapper {
            #[serde(default)]
            tool: ToolTable,
        }
        #[derive(Deserialize, Default)]
        struct ToolTable {
            #[serde(default, rename = "webvouch")]
            webvouch: Option<toml::Value>,
        }

        let defaults = Self::default();
        let wrapper: Wrapper =
            toml::from_str(toml_source).map_err(|e| WebvouchError::Config(e.to_string()))?;

        let Some(overrides) = wrapper.tool.webvouch else {
            return Ok(defaults);
        };

        let defaults_value = toml::Value::try_from(defaults.clone())
            .map_err(|e| WebvouchError::Config(e.to_string()))?;
        let merged = deep_merge(defaults_value, overrides);
        merged
            .try_into()
            .map_err(|e: toml::de::Error| WebvouchError::Config(e.to_string()))
    }

    /// Applies call-site overrides on top of an already-merged config,
    /// returning a new value.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &CrawlOverrides) -> Self {
        if let Some(ref v) = overrides.trusted_domains {
            self.logic.trusted_domains = v.clone();
        }
        if let Some(ref v) = overrides.blacklist_patterns {
            self.logic.blacklist_patterns = v.clone();
        }
        if let Some(ref v) = overrides.whitelist_patterns {
            self.logic.whitelist_patterns = v.clone();
        }
        if let Some(v) = overrides.max_hops {
            self.max_hops = v;
        }
        if let Some(v) = overrides.only_whitelist {
            self.logic.only_whitelist = v;
        }
        if let Some(v) = overrides.only_rel_me {
            self.only_rel_me = v;
        }
        self
    }
}

fn deep_merge(base: toml::Value, overrides: toml::Value) -> toml::Value {
    match (base, overrides) {
        (toml::Value::Table(mut base_table), toml::Value::Table(override_table)) => {
            for (key, value) in override_table {
                let merged = match base_table.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overriding) => overriding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.max_hops, 3);
        assert_eq!(cfg.logic.max_outlinks, 50);
        assert_eq!(cfg.max_content_bytes, 1_048_576);
        assert_eq!(cfg.cache.expire_seconds, 86_400);
        assert_eq!(cfg.logic.same_domain_policy, SameDomainPolicy::NoSelfDomainOrSubdomain);
        assert!(!cfg.logic.use_registrable_domain);
        assert!(!cfg.logic.blacklist_patterns.is_empty());
        assert!(!cfg.logic.whitelist_patterns.is_empty());
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let toml_source = r#"
            [tool.webvouch]
            max_hops = 5

            [tool.webvouch.cache]
            enabled = false
        "#;
        let cfg = CrawlConfig::load_from_toml(toml_source).unwrap();
        assert_eq!(cfg.max_hops, 5);
        assert!(!cfg.cache.enabled);
        // untouched defaults survive the merge
        assert_eq!(cfg.logic.max_outlinks, 50);
    }

    #[test]
    fn missing_tool_table_yields_defaults() {
        let cfg = CrawlConfig::load_from_toml("").unwrap();
        assert_eq!(cfg.max_hops, CrawlConfig::default().max_hops);
    }

    #[test]
    fn call_site_overrides_apply_last() {
        let cfg = CrawlConfig::default().with_overrides(&CrawlOverrides {
            max_hops: Some(1),
            only_rel_me: Some(true),
            ..Default::default()
        });
        assert_eq!(cfg.max_hops, 1);
        assert!(cfg.only_rel_me);
    }
}
