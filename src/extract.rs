//! Link element extraction from parsed HTML.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Anchor,
    HeadLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkElement {
    pub kind: ElementKind,
    pub href: String,
    pub rel: Vec<String>,
    pub raw_html: String,
}

/// `rel` tokens whose presence on a `<link>` element marks it as an asset
/// reference rather than a navigable page — dropped entirely by the
/// extractor.
const ASSET_RELS: &[&str] = &[
    "icon",
    "shortcut icon",
    "apple-touch-icon",
    "mask-icon",
    "manifest",
    "preload",
    "prefetch",
    "dns-prefetch",
    "modulepreload",
    "stylesheet",
];

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").expect("BUG: hardcoded CSS selector a[href] is invalid")
});

static HEAD_LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[href]").expect("BUG: hardcoded CSS selector link[href] is invalid")
});

/// Extracts anchor and head-link elements from `document` in document order,
/// dropping head-links whose `rel` marks them as an asset reference.
#[must_use]
pub fn extract_links(document: &Html) -> Vec<LinkElement> {
    let mut out = Vec::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        if let Some(link) = build_element(element, ElementKind::Anchor) {
            out.push(link);
        }
    }

    for element in document.select(&HEAD_LINK_SELECTOR) {
        let rel = rel_tokens(element);
        if rel.iter().any(|t| ASSET_RELS.contains(&t.as_str())) {
            continue;
        }
        if let Some(link) = build_element(element, ElementKind::HeadLink) {
            out.push(link);
        }
    }

    out
}

fn build_element(element: ElementRef<'_>, kind: ElementKind) -> Option<LinkElement> {
    let href = element.value().attr("href")?.trim().to_string();
    if href.is_empty() {
        return None;
    }
    Some(LinkElement {
        kind,
        href,
        rel: rel_tokens(element),
        raw_html: element.html(),
    })
}

/// Normalizes `rel` to a lowercased token list regardless of whether it was
/// originally space-separated (HTML) or already a list of tokens.
fn rel_tokens(element: ElementRef<'_>) -> Vec<String> {
    element
        .value()
        .attr("rel")
        .map(|rel| {
            rel.split_whitespace()
                .map(str::to_ascii_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn extracts_anchors_in_document_order() {
        let doc = parse(
            r#"<html><body>
                <a href="/first">first</a>
                <a href="/second" rel="nofollow">second</a>
            </body></html>"#,
        );
        let links = extract_links(&doc);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "/first");
        assert_eq!(links[1].rel, vec!["nofollow"]);
    }

    #[test]
    fn drops_asset_head_links() {
        let doc = parse(
            r#"<html><head>
                <link rel="icon" href="/favicon.ico">
                <link rel="canonical" href="/page">
                <link rel="stylesheet" href="/style.css">
            </head></html>"#,
        );
        let links = extract_links(&doc);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, ElementKind::HeadLink);
        assert_eq!(links[0].href, "/page");
    }

    #[test]
    fn normalizes_rel_tokens_lowercase() {
        let doc = parse(r#"<a href="/x" rel="ME Nofollow">x</a>"#);
        let links = extract_links(&doc);
        assert_eq!(links[0].rel, vec!["me", "nofollow"]);
    }

    #[test]
    fn ignores_elements_without_href() {
        let doc = parse(r#"<a name="anchor">no href</a>"#);
        assert!(extract_links(&doc).is_empty());
    }

    #[test]
    fn skips_empty_href() {
        let doc = parse(r#"<a href="">empty</a>"#);
        assert!(extract_links(&doc).is_empty());
    }
}
