//! 404/archive recovery policy.
//!
//! ### Presets
//!
//! | mode         | enabled | probability | max attempts |
//! |--------------|---------|-------------|--------------|
//! | disabled     | no      | 0.0         | 0            |
//! | conservative | yes     | 0.3         | 1            |
//! | normal       | yes     | 0.7         | 3            |
//! | aggressive   | yes     | 1.0         | 5            |
//!
//! Unknown mode names fall back to `normal`. Overrides are clamped to
//! `[0, 1]` for probability and `[0, 5]` for attempts.

pub mod detect;
pub mod random;

pub use detect::{detect, detect_from_content, detect_from_url};
pub use random::{FixedRandom, RandomSource, SequenceRandom, ThreadRandom, shuffle};

use resilex_core::{DomainRule, ExtractionOptions, NotFoundDetection, Policy404Config, Policy404Overrides};

pub const MAX_ARCHIVE_ATTEMPTS: u8 = 5;

/// Domains whose pages are worth recovering even when they look gone.
pub const DEFAULT_HIGH_VALUE_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "github.com",
    "stackoverflow.com",
    "developer.mozilla.org",
    "docs.python.org",
    "doc.rust-lang.org",
    "docs.rs",
    "arxiv.org",
    "nature.com",
    "nytimes.com",
];

/// URL fragments marking listing, tracking and print pages.
pub const DEFAULT_LOW_VALUE_PATTERNS: &[&str] = &[
    "/tag/",
    "/tags/",
    "/category/",
    "/author/",
    "/feed",
    "/amp/",
    "/print/",
    "utm_",
    "?replytocom=",
    "/wp-json/",
];

/// `(enabled, archive_probability, max_archive_attempts)` for a mode name.
pub fn preset(mode: &str) -> (bool, f64, u8) {
    match mode.trim().to_ascii_lowercase().as_str() {
        "disabled" => (false, 0.0, 0),
        "conservative" => (true, 0.3, 1),
        "aggressive" => (true, 1.0, 5),
        _ => (true, 0.7, 3),
    }
}

fn clamp_probability(p: f64) -> Option<f64> {
    if p.is_nan() { None } else { Some(p.clamp(0.0, 1.0)) }
}

fn clamp_attempts(n: i64) -> u8 {
    n.clamp(0, MAX_ARCHIVE_ATTEMPTS as i64) as u8
}

/// Build the effective policy from a preset name plus caller overrides.
///
/// `overrides.mode` wins over `mode`.
pub fn build_policy(mode: &str, overrides: Option<&Policy404Overrides>) -> Policy404Config {
    let mode = overrides.and_then(|o| o.mode.as_deref()).unwrap_or(mode);
    let (enabled, probability, attempts) = preset(mode);

    let mut policy = Policy404Config {
        enabled,
        archive_probability: probability,
        max_archive_attempts: attempts,
        high_value_domains: DEFAULT_HIGH_VALUE_DOMAINS.iter().map(|s| s.to_string()).collect(),
        low_value_patterns: DEFAULT_LOW_VALUE_PATTERNS.iter().map(|s| s.to_string()).collect(),
        custom_rules: Default::default(),
    };

    let Some(overrides) = overrides else {
        return policy;
    };

    if let Some(enabled) = overrides.enabled {
        policy.enabled = enabled;
    }
    if let Some(p) = overrides.archive_probability.and_then(clamp_probability) {
        policy.archive_probability = p;
    }
    if let Some(n) = overrides.max_archive_attempts {
        policy.max_archive_attempts = clamp_attempts(n);
    }
    if let Some(domains) = &overrides.high_value_domains {
        policy.high_value_domains = domains.iter().map(|d| d.trim().to_ascii_lowercase()).collect();
    }
    if let Some(patterns) = &overrides.low_value_patterns {
        policy.low_value_patterns = patterns.iter().map(|p| p.to_ascii_lowercase()).collect();
    }
    for (domain, rule) in &overrides.custom_rules {
        policy.custom_rules.insert(domain.trim().to_ascii_lowercase(), *rule);
    }

    policy
}

/// Policy for one call: configured mode, then `options.config_404`, then the
/// top-level `options.max_archive_attempts`.
pub fn policy_for(default_mode: &str, options: &ExtractionOptions) -> Policy404Config {
    let mut policy = build_policy(default_mode, options.config_404.as_ref());
    if let Some(n) = options.max_archive_attempts {
        policy.max_archive_attempts = clamp_attempts(n);
    }
    policy
}

/// `host` is `domain` or a subdomain of it.
fn domain_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches("*.").trim_start_matches('.');
    host == domain || host.strip_suffix(domain).is_some_and(|prefix| prefix.ends_with('.'))
}

/// Decide whether to spend the escalation ladder on `url`.
///
/// Order: disabled policy, no 404 suspected, explicit domain rule, high-value
/// domain, low-value pattern, random draw against `archive_probability`.
pub fn should_try_archives(
    url: &str, detection: &NotFoundDetection, policy: &Policy404Config, rng: &dyn RandomSource,
) -> bool {
    if !policy.enabled {
        tracing::debug!(url, "archive recovery disabled by policy");
        return false;
    }

    if !detection.is_404 {
        return true;
    }

    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default();

    let rule = policy
        .custom_rules
        .iter()
        .filter(|(domain, _)| domain_matches(&host, domain))
        .max_by_key(|(domain, _)| domain.len())
        .map(|(_, rule)| *rule);

    if let Some(rule) = rule {
        let decision = match rule {
            DomainRule::Always => true,
            DomainRule::Never => false,
            DomainRule::Try => rng.next_f64() < 0.5,
        };
        tracing::debug!(url, ?rule, decision, "custom domain rule applied");
        return decision;
    }

    if policy.high_value_domains.iter().any(|d| domain_matches(&host, d)) {
        tracing::debug!(url, "high-value domain, recovering despite 404");
        return true;
    }

    let lower = url.to_ascii_lowercase();
    if policy.low_value_patterns.iter().any(|p| lower.contains(p.as_str())) {
        let decision = policy.archive_probability >= 1.0;
        tracing::debug!(url, decision, "low-value URL");
        return decision;
    }

    let draw = rng.next_f64();
    let decision = draw <= policy.archive_probability;
    tracing::debug!(url, draw, probability = policy.archive_probability, decision, "archive draw");
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    fn suspected_404() -> NotFoundDetection {
        detect_from_content("Error 404: page not found")
    }

    #[test]
    fn test_presets() {
        assert_eq!(preset("disabled"), (false, 0.0, 0));
        assert_eq!(preset("conservative"), (true, 0.3, 1));
        assert_eq!(preset("normal"), (true, 0.7, 3));
        assert_eq!(preset("AGGRESSIVE"), (true, 1.0, 5));
        assert_eq!(preset("reckless"), preset("normal"));
    }

    #[test]
    fn test_build_policy_clamps_overrides() {
        let overrides = Policy404Overrides {
            archive_probability: Some(1.7),
            max_archive_attempts: Some(12),
            ..Default::default()
        };
        let policy = build_policy("normal", Some(&overrides));
        assert_eq!(policy.archive_probability, 1.0);
        assert_eq!(policy.max_archive_attempts, 5);

        let overrides = Policy404Overrides {
            archive_probability: Some(-0.5),
            max_archive_attempts: Some(-3),
            ..Default::default()
        };
        let policy = build_policy("normal", Some(&overrides));
        assert_eq!(policy.archive_probability, 0.0);
        assert_eq!(policy.max_archive_attempts, 0);
    }

    #[test]
    fn test_override_mode_wins() {
        let overrides = Policy404Overrides { mode: Some("disabled".into()), ..Default::default() };
        let policy = build_policy("aggressive", Some(&overrides));
        assert!(!policy.enabled);
        assert_eq!(policy.max_archive_attempts, 0);
    }

    #[test]
    fn test_policy_for_top_level_attempts() {
        let options = ExtractionOptions { max_archive_attempts: Some(2), ..Default::default() };
        let policy = policy_for("aggressive", &options);
        assert_eq!(policy.max_archive_attempts, 2);
        assert_eq!(policy.archive_probability, 1.0);
    }

    #[test]
    fn test_disabled_never_tries() {
        let policy = build_policy("disabled", None);
        let none = NotFoundDetection::none();
        assert!(!should_try_archives("https://docs.rs/serde", &none, &policy, &FixedRandom(0.0)));
    }

    #[test]
    fn test_non_404_failures_always_try() {
        let policy = build_policy("conservative", None);
        let none = NotFoundDetection::none();
        assert!(should_try_archives("https://blog.rs/post", &none, &policy, &FixedRandom(0.99)));
    }

    #[test]
    fn test_probability_draw() {
        let policy = build_policy("normal", None);
        let detection = suspected_404();
        assert!(should_try_archives("https://blog.rs/post", &detection, &policy, &FixedRandom(0.5)));
        assert!(!should_try_archives("https://blog.rs/post", &detection, &policy, &FixedRandom(0.8)));
    }

    #[test]
    fn test_high_value_domain_ignores_draw() {
        let policy = build_policy("conservative", None);
        let detection = suspected_404();
        assert!(should_try_archives("https://en.wikipedia.org/wiki/Rust", &detection, &policy, &FixedRandom(0.99)));
        assert!(!should_try_archives("https://notwikipedia.org/wiki/Rust", &detection, &policy, &FixedRandom(0.99)));
    }

    #[test]
    fn test_low_value_needs_certainty() {
        let detection = suspected_404();
        let url = "https://blog.rs/tag/rust/";

        let normal = build_policy("normal", None);
        assert!(!should_try_archives(url, &detection, &normal, &FixedRandom(0.0)));

        let overrides = Policy404Overrides { archive_probability: Some(0.99), ..Default::default() };
        let almost = build_policy("normal", Some(&overrides));
        assert!(!should_try_archives(url, &detection, &almost, &FixedRandom(0.0)));

        let aggressive = build_policy("aggressive", None);
        assert!(should_try_archives(url, &detection, &aggressive, &FixedRandom(0.99)));
    }

    #[test]
    fn test_custom_rules_override_patterns() {
        let mut rules = BTreeMap::new();
        rules.insert("blog.rs".to_string(), DomainRule::Always);
        rules.insert("github.com".to_string(), DomainRule::Never);
        rules.insert("forum.rs".to_string(), DomainRule::Try);
        let overrides = Policy404Overrides { custom_rules: rules, ..Default::default() };
        let policy = build_policy("conservative", Some(&overrides));
        let detection = suspected_404();

        assert!(should_try_archives("https://blog.rs/tag/rust/", &detection, &policy, &FixedRandom(0.99)));
        assert!(!should_try_archives("https://github.com/serde-rs/serde", &detection, &policy, &FixedRandom(0.0)));
        assert!(should_try_archives("https://forum.rs/t/1", &detection, &policy, &FixedRandom(0.49)));
        assert!(!should_try_archives("https://forum.rs/t/1", &detection, &policy, &FixedRandom(0.5)));
    }

    #[test]
    fn test_domain_matches() {
        assert!(domain_matches("docs.rs", "docs.rs"));
        assert!(domain_matches("en.wikipedia.org", "wikipedia.org"));
        assert!(domain_matches("en.wikipedia.org", "*.wikipedia.org"));
        assert!(!domain_matches("notwikipedia.org", "wikipedia.org"));
    }
}
