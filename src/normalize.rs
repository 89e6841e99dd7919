//! URL normalization and fetchability classification.
//!
//! Two concerns live here because they share the same derived facts about a
//! URL (scheme, host, path extension): deciding what counts as "the same
//! URL" for dedup purposes, and deciding whether a URL is worth fetching at
//! all before it ever reaches the network.

use url::Url;

/// File extensions that are never HTML, regardless of server-reported
/// content type. Checked case-insensitively against the final path segment.
/// Must match `EXTENSION_DENYLIST` in `naive_backlink/link_logic.py` exactly.
const EXTENSION_DENYLIST: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "ico", "svg", "avif",
    // video/audio
    "mp4", "m4v", "mov", "webm", "ogg", "ogv", "mp3", "wav", "flac", "aac",
    // docs/binaries/archives
    "pdf", "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "exe", "msi", "dmg", "iso",
    "woff", "woff2", "ttf", "otf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // styles/scripts (rarely identity pages)
    "css", "js", "mjs", "map",
];

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Normalize a URL to a canonical string form used for visited/scheduled
/// dedup and cache keys.
///
/// - scheme and host are lowercased
/// - default ports (80 for http, 443 for https) are dropped
/// - the fragment is dropped (it never changes the fetched resource)
/// - a single trailing slash is stripped; the bare root path `/` collapses
///   to nothing at all, so `https://example.com/` normalizes to
///   `https://example.com`
/// - the query string is preserved verbatim (it can change the response)
///
/// Returns `None` if `raw` (resolved against `base` when relative) does not
/// parse as a URL at all.
pub fn normalize(raw: &str, base: Option<&Url>) -> Option<String> {
    let parsed = resolve(raw, base)?;
    Some(normalize_parsed(&parsed))
}

/// Resolve a possibly-relative URL against an optional base.
pub fn resolve(raw: &str, base: Option<&Url>) -> Option<Url> {
    match base {
        Some(b) => b.join(raw).ok(),
        None => Url::parse(raw).ok(),
    }
}

fn normalize_parsed(url: &Url) -> String {
    let mut out = String::with_capacity(url.as_str().len());
    out.push_str(url.scheme());
    out.push_str("://");

    if let Some(host) = url.host_str() {
        out.push_str(host);
    }

    if let Some(port) = url.port() {
        let default_port = match url.scheme() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        if Some(port) != default_port {
            out.push(':');
            out.push_str(&port.to_string());
        }
    }

    let path = url.path();
    if path != "/" {
        if path.ends_with('/') {
            out.push_str(&path[..path.len() - 1]);
        } else {
            out.push_str(path);
        }
    }

    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }

    out
}

/// Extension-based guess at whether a URL's path plausibly serves HTML.
/// A URL with no extension, or an unrecognized one, is treated as probably
/// HTML — the denylist only rules things out, it never rules things in.
#[must_use]
pub fn has_html_like_path(url: &Url) -> bool {
    match path_extension(url) {
        Some(ext) => !EXTENSION_DENYLIST.contains(&ext.as_str()),
        None => true,
    }
}

/// Full fetchability gate: allowed scheme plus a plausibly-HTML path.
#[must_use]
pub fn is_fetchable(url: &Url) -> bool {
    ALLOWED_SCHEMES.contains(&url.scheme()) && has_html_like_path(url)
}

fn path_extension(url: &Url) -> Option<String> {
    let path = url.path();
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// The "registrable domain" (eTLD+1) of a host, or the naive fallback used
/// by default: the host with a leading `www.` stripped and nothing else.
///
/// `use_registrable_domain` selects which algorithm runs; the naive fallback
/// is also used whenever the host cannot be classified against the public
/// suffix list (e.g. a bare IP address or an unlisted TLD).
#[must_use]
pub fn registrable_or_host(host: &str, use_registrable_domain: bool) -> String {
    let host = host.to_ascii_lowercase();
    if use_registrable_domain
        && let Some(domain) = psl::domain(host.as_bytes())
    {
        return String::from_utf8_lossy(domain.as_bytes()).into_owned();
    }
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_port_and_fragment() {
        assert_eq!(
            normalize("https://Example.Com:443/Path/#frag", None).unwrap(),
            "https://example.com/Path"
        );
        assert_eq!(
            normalize("http://example.com:80/a/b/", None).unwrap(),
            "http://example.com/a/b"
        );
        assert_eq!(
            normalize("https://example.com:8443/x", None).unwrap(),
            "https://example.com:8443/x"
        );
    }

    #[test]
    fn bare_root_path_collapses_to_empty() {
        assert_eq!(normalize("https://example.com/", None).unwrap(), "https://example.com");
        assert_eq!(normalize("https://example.com", None).unwrap(), "https://example.com");
    }

    #[test]
    fn preserves_query() {
        assert_eq!(
            normalize("https://example.com/search?q=1&p=2", None).unwrap(),
            "https://example.com/search?q=1&p=2"
        );
    }

    #[test]
    fn resolves_relative_against_base() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        assert_eq!(
            normalize("../other", Some(&base)).unwrap(),
            "https://example.com/other"
        );
    }

    #[test]
    fn denylists_known_asset_extensions() {
        let url = Url::parse("https://example.com/logo.PNG").unwrap();
        assert!(!has_html_like_path(&url));
        let url = Url::parse("https://example.com/report.pdf").unwrap();
        assert!(!is_fetchable(&url));
    }

    #[test]
    fn extensionless_path_is_fetchable() {
        let url = Url::parse("https://example.com/about-us").unwrap();
        assert!(is_fetchable(&url));
    }

    #[test]
    fn non_http_scheme_is_never_fetchable() {
        let url = Url::parse("ftp://example.com/file.html").unwrap();
        assert!(!is_fetchable(&url));
    }

    #[test]
    fn registrable_fallback_strips_www_only() {
        assert_eq!(registrable_or_host("www.example.com", false), "example.com");
        assert_eq!(registrable_or_host("blog.example.com", false), "blog.example.com");
    }
}
