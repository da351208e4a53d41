//! Suspected-404 detection from page content and from the URL itself.

use std::sync::LazyLock;

use regex::Regex;
use resilex_core::{AttemptResult, DetectionMethod, NotFoundDetection};

/// Phrases typical of "not found" pages, lowercase.
pub const NOT_FOUND_PHRASES: &[&str] = &[
    "404 not found",
    "404: not found",
    "error 404",
    "page not found",
    "page does not exist",
    "page you requested could not be found",
    "page you are looking for",
    "this page doesn't exist",
    "the requested url was not found",
    "no longer available",
];

/// Matched phrases needed for full confidence.
const PHRASES_FOR_CERTAINTY: f64 = 3.0;

/// Confidence assigned to a URL-path match.
pub const URL_PATTERN_CONFIDENCE: f64 = 0.8;

static NOT_FOUND_ROUTES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/(?:404|error[-_]?404|not[-_]?found|page[-_]?not[-_]?found)(?:\.html?|\.php|\.aspx?)?(?:[/?#]|$)",
        r"(?i)[?&](?:error|status|code)=404(?:&|$)",
        r"(?i)[?&]page[-_]?not[-_]?found(?:[=&]|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Look for 404 boilerplate in `content`.
pub fn detect_from_content(content: &str) -> NotFoundDetection {
    if content.trim().is_empty() {
        return NotFoundDetection::none();
    }

    let lower = content.to_lowercase();
    let matched: Vec<String> =
        NOT_FOUND_PHRASES.iter().filter(|p| lower.contains(**p)).map(|p| p.to_string()).collect();

    if matched.is_empty() {
        return NotFoundDetection::none();
    }

    NotFoundDetection {
        is_404: true,
        confidence: (matched.len() as f64 / PHRASES_FOR_CERTAINTY).min(1.0),
        method: DetectionMethod::Content,
        matched,
    }
}

/// Look for a known 404 route in `url`.
pub fn detect_from_url(url: &str) -> NotFoundDetection {
    let matched: Vec<String> = NOT_FOUND_ROUTES
        .iter()
        .filter_map(|re| re.find(url))
        .map(|m| m.as_str().to_string())
        .collect();

    if matched.is_empty() {
        return NotFoundDetection::none();
    }

    NotFoundDetection { is_404: true, confidence: URL_PATTERN_CONFIDENCE, method: DetectionMethod::UrlPattern, matched }
}

/// Strongest content signal across `attempts`, else the URL signal.
pub fn detect(url: &str, attempts: &[AttemptResult]) -> NotFoundDetection {
    let best = attempts
        .iter()
        .filter(|a| a.content_length > 0)
        .map(|a| detect_from_content(&a.content))
        .filter(|d| d.is_404)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

    best.unwrap_or_else(|| detect_from_url(url))
}
