//! Backlink detection, classification, and evidence record construction.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::LogicConfig;
use crate::extract::LinkElement;
use crate::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    Backlink,
    RelMe,
    Mention,
    Redirect,
    Profile,
    PlatformVerified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Strong,
    Weak,
    Indirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Context {
    OriginPage,
    CandidatePage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlContext {
    pub url: String,
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDetails {
    pub raw_html: String,
    pub rel: Vec<String>,
    pub nofollow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub kind: Kind,
    pub source: UrlContext,
    pub target: UrlContext,
    pub link: Option<LinkDetails>,
    pub classification: Classification,
    pub hops: u32,
    pub trusted_surface: bool,
    pub observed_at: Option<String>,
    pub notes: String,
}

/// Monotonic evidence-id allocator. One instance per crawl; `direct`/`indirect`
/// must never be mixed into the same counter since the IDs share no
/// namespace (`e-backlink-N` vs `e-indirect-N`).
#[derive(Debug, Default)]
pub struct EvidenceIds {
    direct: u32,
    indirect: u32,
}

impl EvidenceIds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_direct(&mut self) -> String {
        self.direct += 1;
        format!("e-backlink-{}", self.direct)
    }

    fn next_indirect(&mut self) -> String {
        self.indirect += 1;
        format!("e-indirect-{}", self.indirect)
    }
}

/// Returns the first element whose resolved-and-normalized `href` equals
/// `target_normalized`, skipping elements whose resolved href is not a
/// fetchable URL.
#[must_use]
pub fn detect_backlink<'a>(
    current_url: &Url,
    target_normalized: &str,
    elements: &'a [LinkElement],
) -> Option<&'a LinkElement> {
    elements.iter().find(|el| {
        let Some(resolved) = normalize::resolve(&el.href, Some(current_url)) else {
            return false;
        };
        if !normalize::is_fetchable(&resolved) {
            return false;
        }
        normalize::normalize(&el.href, Some(current_url)).as_deref() == Some(target_normalized)
    })
}

/// `(kind, classification, trusted_surface)` for a detected backlink element.
#[must_use]
pub fn classify(
    element: &LinkElement,
    source_url: &Url,
    cfg: &LogicConfig,
) -> (Kind, Classification, bool) {
    let strong = element.rel.iter().any(|t| t == "me");
    let classification = if strong {
        Classification::Strong
    } else {
        Classification::Weak
    };
    let kind = if strong { Kind::RelMe } else { Kind::Backlink };

    let trusted_surface = source_url.host_str().is_some_and(|host| {
        cfg.trusted_domains
            .iter()
            .any(|needle| host.contains(needle.as_str()))
    });

    (kind, classification, trusted_surface)
}

/// Normalizes `raw` for inclusion in an evidence record, falling back to the
/// raw string unchanged if it doesn't parse (normalization never throws).
fn normalized_or_raw(raw: &str) -> String {
    normalize::normalize(raw, None).unwrap_or_else(|| raw.to_string())
}

/// Builds a direct (candidate → origin) evidence record. `source` names the
/// origin being verified and `target` names the candidate page the backlink
/// element was discovered on, following this crate's fixed evidence-record
/// convention (not the page the element physically lives on). `origin_url`
/// and `candidate_url` are normalized before being recorded, per §3's "All
/// equality and hashing occur on normalized form."
#[must_use]
pub fn make_evidence(
    ids: &mut EvidenceIds,
    origin_url: &str,
    candidate_url: &str,
    element: &LinkElement,
    classification: Classification,
    kind: Kind,
    trusted_surface: bool,
    hops: u32,
) -> EvidenceRecord {
    EvidenceRecord {
        id: ids.next_direct(),
        kind,
        source: UrlContext {
            url: normalized_or_raw(origin_url),
            context: Context::OriginPage,
        },
        target: UrlContext {
            url: normalized_or_raw(candidate_url),
            context: Context::CandidatePage,
        },
        link: Some(LinkDetails {
            raw_html: element.raw_html.clone(),
            rel: element.rel.clone(),
            nofollow: element.rel.iter().any(|t| t == "nofollow"),
        }),
        classification,
        hops,
        trusted_surface,
        observed_at: Some(chrono::Utc::now().to_rfc3339()),
        notes: String::new(),
    }
}

/// Builds an indirect A↔B↔C record. `trusted_surface` is unconditionally
/// `false` — the original behavior this crate preserves rather than
/// deriving from the pivot's own evidence (open question, resolved in
/// DESIGN.md). `origin_url` and `neighbor_url` are normalized before being
/// recorded or embedded in `notes` (`pivot_url` arrives already normalized
/// from the scheduler's `pivot_confirmed`/`parent` maps).
#[must_use]
pub fn make_indirect_evidence(
    ids: &mut EvidenceIds,
    origin_url: &str,
    pivot_url: &str,
    neighbor_url: &str,
    hops: u32,
) -> EvidenceRecord {
    let origin_url = normalized_or_raw(origin_url);
    let neighbor_url = normalized_or_raw(neighbor_url);
    let notes = format!("pivot={pivot_url} chain={origin_url}<->{pivot_url}<->{neighbor_url}");
    EvidenceRecord {
        id: ids.next_indirect(),
        kind: Kind::Backlink,
        source: UrlContext {
            url: origin_url,
            context: Context::OriginPage,
        },
        target: UrlContext {
            url: neighbor_url,
            context: Context::CandidatePage,
        },
        link: None,
        classification: Classification::Indirect,
        hops,
        trusted_surface: false,
        observed_at: Some(chrono::Utc::now().to_rfc3339()),
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ElementKind;

    fn el(href: &str, rel: &[&str]) -> LinkElement {
        LinkElement {
            kind: ElementKind::Anchor,
            href: href.to_string(),
            rel: rel.iter().map(|s| s.to_string()).collect(),
            raw_html: format!(r#"<a href="{href}">x</a>"#),
        }
    }

    #[test]
    fn detects_first_matching_backlink() {
        let current = Url::parse("https://b.example/page").unwrap();
        let elements = vec![
            el("/unrelated", &[]),
            el("https://a.example/", &["me"]),
        ];
        let found = detect_backlink(&current, "https://a.example", &elements).unwrap();
        assert!(found.rel.contains(&"me".to_string()));
    }

    #[test]
    fn skips_non_fetchable_hrefs() {
        let current = Url::parse("https://b.example/page").unwrap();
        let elements = vec![el("mailto:a@example.com", &[])];
        assert!(detect_backlink(&current, "https://a.example", &elements).is_none());
    }

    #[test]
    fn classifies_rel_me_as_strong() {
        let cfg = LogicConfig::default();
        let source = Url::parse("https://b.example/").unwrap();
        let element = el("https://a.example/", &["me"]);
        let (kind, classification, _) = classify(&element, &source, &cfg);
        assert_eq!(kind, Kind::RelMe);
        assert_eq!(classification, Classification::Strong);
    }

    #[test]
    fn classifies_plain_link_as_weak() {
        let cfg = LogicConfig::default();
        let source = Url::parse("https://b.example/").unwrap();
        let element = el("https://a.example/", &[]);
        let (kind, classification, _) = classify(&element, &source, &cfg);
        assert_eq!(kind, Kind::Backlink);
        assert_eq!(classification, Classification::Weak);
    }

    #[test]
    fn indirect_notes_contain_pivot_and_chain() {
        let mut ids = EvidenceIds::new();
        // pivot_url arrives pre-normalized from the scheduler; origin_url and
        // neighbor_url do not, and are normalized inside the builder.
        let ev = make_indirect_evidence(&mut ids, "https://a.example/", "https://b.example", "https://c.example/", 2);
        assert!(ev.notes.contains("pivot=https://b.example"));
        assert!(ev.notes.contains("chain=https://a.example<->https://b.example<->https://c.example"));
        assert_eq!(ev.source.url, "https://a.example");
        assert_eq!(ev.target.url, "https://c.example");
        assert!(!ev.trusted_surface);
        assert_eq!(ev.id, "e-indirect-1");
    }

    #[test]
    fn direct_evidence_normalizes_source_and_target_urls() {
        let mut ids = EvidenceIds::new();
        let element = el("https://a.example/", &["me"]);
        let ev = make_evidence(
            &mut ids,
            "https://alice.example/",
            "https://b.example/page/",
            &element,
            Classification::Strong,
            Kind::RelMe,
            false,
            1,
        );
        assert_eq!(ev.source.url, "https://alice.example");
        assert_eq!(ev.target.url, "https://b.example/page");
    }

    #[test]
    fn direct_and_indirect_ids_share_no_namespace() {
        let mut ids = EvidenceIds::new();
        assert_eq!(ids.next_direct(), "e-backlink-1");
        assert_eq!(ids.next_indirect(), "e-indirect-1");
        assert_eq!(ids.next_direct(), "e-backlink-2");
    }
}
