//! Cosmetic URL repair, canonicalization, and junk-domain detection.
//!
//! Repairs run on the raw string before structural parsing. Each repair
//! reports an issue tag so callers can see what was changed.

use std::sync::LazyLock;

use regex::Regex;

use super::ssrf::{DENIED_SCHEMES, is_forbidden_hostname};

static DOT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+dot\s+|\s*[\[\(]dot[\]\)]\s*").expect("valid regex"));

static PROTOCOL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(https?):?/{1,3}\s*").expect("valid regex"));

static OTHER_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.-]*):(//)?").expect("valid regex"));

/// Reserved or placeholder hosts that never carry real content.
static JUNK_HOSTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(?:www\.)?example\.(?:com|net|org)$",
        r"(?:^|\.)(?:test|example|invalid|localdomain)$",
        r"^(?:www\.)?(?:test|fake|dummy|placeholder|yourdomain|your-domain|yoursite|mysite|domain|website)\.(?:com|net|org)$",
        r"\.\.",
        r"(?:^|\.)-|-(?:\.|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl UrlError {
    pub fn issue(&self) -> &'static str {
        match self {
            UrlError::Empty => "empty_url",
            UrlError::UnsupportedScheme(_) => "invalid_protocol",
            UrlError::MissingHost => "missing_host",
            UrlError::InvalidUrl(_) => "malformed_url",
        }
    }
}

/// Raw string after cosmetic repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    pub url: String,
    pub issues: Vec<&'static str>,
}

/// Repair known cosmetic malformations.
///
/// Order matters: ` dot ` substitution consumes surrounding spaces, so it runs
/// before stray-whitespace removal.
pub fn repair(raw: &str) -> Repaired {
    let mut issues = Vec::new();

    let trimmed = raw.trim();
    if trimmed.len() != raw.len() {
        issues.push("whitespace_trimmed");
    }

    let mut url = trimmed.to_string();

    if DOT_WORD.is_match(&url) {
        url = DOT_WORD.replace_all(&url, ".").into_owned();
        issues.push("dot_substitution");
    }

    url = repair_protocol(&url, &mut issues);

    let (scheme_part, rest) = match url.find("://") {
        Some(idx) => url.split_at(idx + 3),
        None => ("", url.as_str()),
    };
    if rest.chars().any(char::is_whitespace) {
        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        let authority: String = authority.chars().filter(|c| !c.is_whitespace()).collect();
        let tail = tail.trim().replace(char::is_whitespace, "%20");
        url = format!("{scheme_part}{authority}{tail}");
        issues.push("internal_whitespace");
    }

    Repaired { url, issues }
}

/// Collapse repeated protocol prefixes, normalize a malformed one, or default to https.
fn repair_protocol(url: &str, issues: &mut Vec<&'static str>) -> String {
    let mut rest = url;
    let mut scheme: Option<String> = None;
    let mut prefixes = 0;
    let mut well_formed = true;

    while let Some(caps) = PROTOCOL_PREFIX.captures(rest) {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let name = caps.get(1).map_or("https", |m| m.as_str()).to_ascii_lowercase();
        if whole.trim_end() != format!("{}://", &whole[..name.len()]) {
            well_formed = false;
        }
        scheme = Some(name);
        rest = &rest[whole.len()..];
        prefixes += 1;
    }

    match scheme {
        Some(scheme) => {
            if prefixes > 1 {
                issues.push("double_protocol");
            } else if !well_formed {
                issues.push("malformed_protocol");
            }
            format!("{scheme}://{rest}")
        }
        None => {
            if let Some(caps) = OTHER_SCHEME.captures(url) {
                let name = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
                if caps.get(2).is_some() || DENIED_SCHEMES.contains(&name.as_str()) {
                    return url.to_string();
                }
            }
            issues.push("missing_protocol");
            format!("https://{url}")
        }
    }
}

/// Parse a repaired URL into canonical form.
///
/// Normalization steps:
/// 1. Reject empty input and non-http(s) schemes
/// 2. Lowercase the host (the parser does this for domains)
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Reason a hostname is considered junk, if it is.
pub fn suspicious_host(host: &str) -> Option<&'static str> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    if JUNK_HOSTS[..3].iter().any(|re| re.is_match(&host)) {
        return Some("reserved_or_placeholder_domain");
    }
    if JUNK_HOSTS[3..].iter().any(|re| re.is_match(&host)) {
        return Some("malformed_hostname");
    }

    let Some((_, tld)) = host.rsplit_once('.') else {
        return Some("missing_tld");
    };
    if tld.len() < 2 || (tld.chars().any(|c| c.is_ascii_digit()) && !tld.starts_with("xn--")) {
        return Some("malformed_tld");
    }

    None
}

/// Reason a reader-proxy URL's embedded target is bogus, if it is.
///
/// `path_and_query` is everything after the reader host, e.g.
/// `/https://docs.rs/serde`.
pub fn suspicious_reader_target(path_and_query: &str) -> Option<&'static str> {
    let target = path_and_query.trim_start_matches('/');
    if target.is_empty() {
        return Some("reader_url_without_target");
    }

    let candidate = if target.contains("://") { target.to_string() } else { format!("https://{target}") };
    let Ok(parsed) = url::Url::parse(&candidate) else {
        return Some("reader_target_unparsable");
    };

    match parsed.host() {
        Some(url::Host::Domain(domain)) => {
            if is_forbidden_hostname(domain) {
                Some("reader_target_forbidden")
            } else {
                suspicious_host(domain).map(|_| "reader_target_junk")
            }
        }
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_)) => Some("reader_target_ip_literal"),
        None => Some("reader_target_unparsable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_untouched() {
        let repaired = repair("https://docs.rs/serde");
        assert_eq!(repaired.url, "https://docs.rs/serde");
        assert!(repaired.issues.is_empty());
    }

    #[test]
    fn test_repair_trims_whitespace() {
        let repaired = repair("  https://docs.rs/serde \n");
        assert_eq!(repaired.url, "https://docs.rs/serde");
        assert_eq!(repaired.issues, vec!["whitespace_trimmed"]);
    }

    #[test]
    fn test_repair_dot_substitution() {
        let repaired = repair("https://docs dot rs/serde");
        assert_eq!(repaired.url, "https://docs.rs/serde");
        assert!(repaired.issues.contains(&"dot_substitution"));
    }

    #[test]
    fn test_repair_bracket_dot() {
        let repaired = repair("https://docs[dot]rs/serde");
        assert_eq!(repaired.url, "https://docs.rs/serde");
    }

    #[test]
    fn test_repair_double_protocol() {
        assert_eq!(repair("https://https://docs.rs").url, "https://docs.rs");
        assert_eq!(repair("http://https//docs.rs").url, "https://docs.rs");
        assert!(repair("https://http://docs.rs").issues.contains(&"double_protocol"));
    }

    #[test]
    fn test_repair_malformed_single_protocol() {
        let repaired = repair("https:/docs.rs/serde");
        assert_eq!(repaired.url, "https://docs.rs/serde");
        assert_eq!(repaired.issues, vec!["malformed_protocol"]);
    }

    #[test]
    fn test_repair_missing_protocol() {
        let repaired = repair("docs.rs/serde");
        assert_eq!(repaired.url, "https://docs.rs/serde");
        assert_eq!(repaired.issues, vec!["missing_protocol"]);
    }

    #[test]
    fn test_repair_keeps_other_schemes_for_rejection() {
        assert_eq!(repair("ftp://files.rs/a").url, "ftp://files.rs/a");
        assert_eq!(repair("javascript:alert(1)").url, "javascript:alert(1)");
        assert!(repair("javascript:alert(1)").issues.is_empty());
    }

    #[test]
    fn test_repair_port_without_scheme_gets_https() {
        assert_eq!(repair("localhost:8080/admin").url, "https://localhost:8080/admin");
    }

    #[test]
    fn test_repair_internal_whitespace() {
        let repaired = repair("https://docs .rs/some path");
        assert_eq!(repaired.url, "https://docs.rs/some%20path");
        assert!(repaired.issues.contains(&"internal_whitespace"));
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://docs.rs/serde#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/serde");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://DOCS.RS").unwrap();
        assert_eq!(url.host_str(), Some("docs.rs"));
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://docs.rs/search?a=1&b=2").unwrap();
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_suspicious_host_reserved() {
        assert!(suspicious_host("example.com").is_some());
        assert!(suspicious_host("www.example.org").is_some());
        assert!(suspicious_host("shop.test").is_some());
        assert!(suspicious_host("fake.com").is_some());
    }

    #[test]
    fn test_suspicious_host_malformed() {
        assert_eq!(suspicious_host("docs.r"), Some("malformed_tld"));
        assert_eq!(suspicious_host("docs.c0m"), Some("malformed_tld"));
        assert_eq!(suspicious_host("intranet"), Some("missing_tld"));
        assert_eq!(suspicious_host("-bad.rs"), Some("malformed_hostname"));
    }

    #[test]
    fn test_suspicious_host_real_domains() {
        assert_eq!(suspicious_host("docs.rs"), None);
        assert_eq!(suspicious_host("developer.mozilla.org"), None);
        assert_eq!(suspicious_host("examples.rust-lang.org"), None);
        assert_eq!(suspicious_host("xn--e1afmkfd.xn--p1ai"), None);
    }

    #[test]
    fn test_suspicious_reader_target() {
        assert_eq!(suspicious_reader_target("/"), Some("reader_url_without_target"));
        assert_eq!(suspicious_reader_target("/https://example.com"), Some("reader_target_junk"));
        assert_eq!(suspicious_reader_target("/http://localhost/x"), Some("reader_target_forbidden"));
        assert_eq!(suspicious_reader_target("/http://10.0.0.1/"), Some("reader_target_ip_literal"));
        assert_eq!(suspicious_reader_target("/https://docs.rs/serde"), None);
    }
}
