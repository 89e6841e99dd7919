//! Wildcard URL pattern matching for the blacklist/whitelist policy layer.
//!
//! A pattern (`github.com`, `github.com/sponsors/*`, `*.example.com`) is a
//! shell-style glob compared against six derived forms of the *candidate
//! URL* — `host`, `host/`, `host/*`, `host+path`, `host+path/`, and
//! `host+path/*` — rather than the other way around. Deriving the
//! candidate forms from the URL and matching the (precompiled) pattern
//! glob against each is what lets a bare-section pattern like
//! `github.com/sponsors/*` block both `github.com/sponsors` itself and
//! everything nested under it, via the `host+path/` and `host+path/*`
//! forms respectively, without also swallowing unrelated paths on the
//! same host — unlike a pattern that tried to derive its own forms, which
//! would have no way to tell "no path given" apart from "any path".

use regex::Regex;
use url::Url;

/// A single compiled pattern: one anchored regex translated from the glob,
/// plus the strict-subdomain suffix when the pattern begins `*.`.
#[derive(Debug)]
pub struct CompiledPattern {
    regex: Regex,
    strict_subdomain_suffix: Option<String>,
}

/// A precompiled set of patterns, built once per crawl from the effective
/// merged blacklist/whitelist.
#[derive(Debug, Default)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    #[must_use]
    pub fn compile<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| CompiledPattern::compile(p.as_ref()))
            .collect();
        Self { patterns }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if `url` matches any pattern in the set.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let path = url.path().trim_start_matches('/').to_ascii_lowercase();
        let hostpath = if path.is_empty() {
            host.clone()
        } else {
            format!("{host}/{path}")
        };
        let candidates = [
            host.clone(),
            format!("{host}/"),
            format!("{host}/*"),
            hostpath.clone(),
            format!("{hostpath}/"),
            format!("{hostpath}/*"),
        ];

        self.patterns
            .iter()
            .any(|p| p.matches(&host, &candidates))
    }
}

impl CompiledPattern {
    fn compile(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }

        let regex = Regex::new(&format!("^{}$", glob_to_regex(&lower))).ok()?;

        let strict_subdomain_suffix = lower.strip_prefix("*.").map(|rest| {
            rest.trim_end_matches("/*")
                .trim_end_matches('/')
                .to_string()
        });

        Some(Self {
            regex,
            strict_subdomain_suffix,
        })
    }

    /// `candidates` are the six URL-derived forms (§4.2); `host` is passed
    /// separately since the strict-subdomain rule ignores path entirely.
    fn matches(&self, host: &str, candidates: &[String]) -> bool {
        if candidates.iter().any(|c| self.regex.is_match(c)) {
            return true;
        }
        if let Some(suffix) = &self.strict_subdomain_suffix {
            return host != suffix && host.ends_with(&format!(".{suffix}"));
        }
        false
    }
}

/// Translates a shell-style glob (`*` → any run of characters, `?` → any
/// single character) into an unanchored regex fragment, escaping every
/// other character literally.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn bare_host_matches_any_path() {
        let set = PatternSet::compile(["github.com"]);
        assert!(set.matches(&u("https://github.com/")));
        assert!(set.matches(&u("https://github.com/user/repo")));
        assert!(!set.matches(&u("https://notgithub.com/")));
    }

    #[test]
    fn exact_path_pattern_matches_only_that_page() {
        let set = PatternSet::compile(["github.com/octocat"]);
        assert!(set.matches(&u("https://github.com/octocat")));
        assert!(!set.matches(&u("https://github.com/octocat/repo")));
        assert!(!set.matches(&u("https://github.com/otheruser")));
    }

    #[test]
    fn wildcard_path_pattern_matches_section_and_subpaths() {
        let set = PatternSet::compile(["github.com/sponsors/*"]);
        assert!(set.matches(&u("https://github.com/sponsors")));
        assert!(set.matches(&u("https://github.com/sponsors/pypa")));
        assert!(!set.matches(&u("https://github.com/pypa/pip")));
    }

    #[test]
    fn strict_subdomain_excludes_apex() {
        let set = PatternSet::compile(["*.example.com"]);
        assert!(set.matches(&u("https://blog.example.com/post")));
        assert!(!set.matches(&u("https://example.com/")));
    }

    #[test]
    fn wildcard_segment_matches_variable_path() {
        let set = PatternSet::compile(["twitter.com/*/status/*"]);
        assert!(set.matches(&u("https://twitter.com/someone/status/12345")));
        assert!(!set.matches(&u("https://twitter.com/someone")));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let set = PatternSet::compile(Vec::<&str>::new());
        assert!(set.is_empty());
        assert!(!set.matches(&u("https://example.com/")));
    }
}
