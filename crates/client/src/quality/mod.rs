//! Content validity classification.
//!
//! Decides whether extracted text is real content or an error page, empty
//! shell, or boilerplate in disguise. Pure and deterministic: the same input
//! always yields the same verdict.
//!
//! Checks, first failure wins:
//! 1. empty or whitespace-only
//! 2. known error/boilerplate phrase (case-insensitive)
//! 3. fewer than 100 characters after trimming
//! 4. fewer than 50 characters once tags are stripped and whitespace collapsed
//! 5. more than 10 words longer than 3 chars with distinct/total below 0.3

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use resilex_core::{ContentReason, ContentValidation};

pub const MIN_CONTENT_CHARS: usize = 100;
pub const MIN_TEXT_CHARS: usize = 50;
pub const MIN_WORDS_FOR_DIVERSITY: usize = 10;
pub const MIN_DIVERSITY_RATIO: f64 = 0.3;

/// Lowercase phrases that mark content as an error or boilerplate page.
pub const USELESS_PATTERNS: &[&str] = &[
    // search pages with nothing on them
    "no results found",
    "your search did not match any documents",
    "did not match any documents",
    "no search results",
    // reader failures
    "failed to fetch",
    "unable to fetch the url",
    "error fetching url",
    "could not retrieve the content",
    "target url returned error",
    // generic HTTP errors
    "404: not found",
    "404 not found",
    "page not found",
    "403 forbidden",
    "access denied",
    "500 internal server error",
    "502 bad gateway",
    "503 service unavailable",
    "too many requests",
    "rate limit exceeded",
    "please enable javascript",
    // cache and archive misses
    "wayback machine doesn't have that page archived",
    "the wayback machine has not archived that url",
    "no cached version of this page",
    "the requested url was not found on this server",
];

/// Reader scaffold line that precedes the page body.
const SCAFFOLD_MARKER: &str = "markdown content:";

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Classify `content` produced by `source`.
pub fn classify(content: &str, source: &str) -> ContentValidation {
    let content_length = content.chars().count();
    let verdict = |reason: ContentReason, pattern: Option<&str>, text_length: usize, diversity_ratio: Option<f64>| {
        ContentValidation {
            is_meaningful: reason == ContentReason::MeaningfulContent,
            reason,
            pattern: pattern.map(str::to_string),
            content_length,
            text_length,
            diversity_ratio,
            source: source.to_string(),
        }
    };

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return verdict(ContentReason::EmptyContent, None, 0, None);
    }

    let text = visible_text(trimmed);
    let text_length = text.chars().count();

    let lower = trimmed.to_lowercase();
    if let Some(pattern) = useless_pattern(&lower) {
        return verdict(ContentReason::UselessPatternDetected, Some(pattern), text_length, None);
    }

    if trimmed.chars().count() < MIN_CONTENT_CHARS {
        return verdict(ContentReason::ContentTooShort, None, text_length, None);
    }

    if text_length < MIN_TEXT_CHARS {
        return verdict(ContentReason::InsufficientTextContent, None, text_length, None);
    }

    let ratio = diversity_ratio(&text);
    if let Some(ratio) = ratio
        && ratio < MIN_DIVERSITY_RATIO
    {
        return verdict(ContentReason::RepetitiveContent, None, text_length, Some(ratio));
    }

    verdict(ContentReason::MeaningfulContent, None, text_length, ratio)
}

/// First useless phrase present in already-lowercased content.
fn useless_pattern(lower: &str) -> Option<&'static str> {
    if let Some(pattern) = USELESS_PATTERNS.iter().copied().find(|p| lower.contains(p)) {
        return Some(pattern);
    }

    // A reader scaffold with nothing after the marker.
    match lower.rfind(SCAFFOLD_MARKER) {
        Some(idx) if lower[idx + SCAFFOLD_MARKER.len()..].trim().is_empty() => Some(SCAFFOLD_MARKER),
        _ => None,
    }
}

/// Strip tags and collapse whitespace.
pub fn visible_text(content: &str) -> String {
    let stripped = TAG.replace_all(content, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Distinct/total ratio over words longer than 3 chars; `None` below the word threshold.
fn diversity_ratio(text: &str) -> Option<f64> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.chars().count() > 3)
        .collect();

    if words.len() <= MIN_WORDS_FOR_DIVERSITY {
        return None;
    }

    let distinct: HashSet<&str> = words.iter().map(String::as_str).collect();
    Some(distinct.len() as f64 / words.len() as f64)
}
