//! URL validation and normalization with SSRF protection.
//!
//! ### Cosmetic repair
//! - Trim whitespace, collapse doubled protocol prefixes
//! - Replace literal ` dot ` with `.`, drop stray whitespace in the host
//! - Default scheme to `https` when none is given
//!
//! ### Rejection (in order, first failure wins)
//! 1. Scheme must be http/https
//! 2. Hostname blacklist: `localhost`, `*.local`
//! 3. Junk domains: reserved/placeholder names, malformed TLDs, reader-proxy
//!    URLs wrapping a bogus target
//!    (a junk name that resolves to a private address is reported as
//!    `private_ip_detected` instead)
//! 4. DNS: every resolved address must be public
//!
//! Rejections are values, never errors: `UrlValidation::valid == false`.

pub mod repair;
pub mod ssrf;

use std::sync::Arc;

use resilex_core::UrlValidation;

pub use repair::{Repaired, UrlError, canonicalize, repair, suspicious_host, suspicious_reader_target};
pub use ssrf::{Resolver, SsrfError, StaticResolver, SystemResolver, check_host, is_private_or_reserved, validate_ip};

/// Validates candidate URLs before any network activity.
#[derive(Clone)]
pub struct UrlValidator {
    resolver: Arc<dyn Resolver>,
    reader_host: Option<String>,
}

impl UrlValidator {
    /// Create a validator using the given resolver.
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver, reader_host: None }
    }

    /// Treat URLs on `host` as reader-proxy URLs and inspect their embedded target.
    pub fn with_reader_host(mut self, host: impl Into<String>) -> Self {
        self.reader_host = Some(host.into().to_ascii_lowercase());
        self
    }

    /// Validate and normalize `raw`.
    pub async fn validate(&self, raw: &str) -> UrlValidation {
        let repaired = repair(raw);
        let mut issues: Vec<String> = repaired.issues.iter().map(|s| s.to_string()).collect();
        let has_fixes = !issues.is_empty();

        let reject = |mut issues: Vec<String>, issue: &str, error: String, normalized: Option<String>| {
            issues.push(issue.to_string());
            tracing::debug!(url = %raw, issue, "URL rejected");
            UrlValidation {
                valid: false,
                issues,
                original_url: raw.to_string(),
                normalized_url: normalized,
                has_fixes,
                error: Some(error),
            }
        };

        if raw.trim().is_empty() {
            return reject(issues, UrlError::Empty.issue(), UrlError::Empty.to_string(), None);
        }

        let parsed = match canonicalize(&repaired.url) {
            Ok(parsed) => parsed,
            Err(e) => return reject(issues, e.issue(), e.to_string(), None),
        };
        let normalized = parsed.to_string();

        let Some(host) = parsed.host() else {
            return reject(issues, "missing_host", UrlError::MissingHost.to_string(), Some(normalized));
        };

        if let url::Host::Domain(domain) = host {
            if ssrf::is_forbidden_hostname(domain) {
                let err = SsrfError::ForbiddenHostname(domain.to_string());
                return reject(issues, err.issue(), err.to_string(), Some(normalized));
            }

            if let Some(reason) = suspicious_host(domain) {
                issues.push(reason.to_string());
                // A junk name that resolves inward is still an SSRF target.
                if let Err(err @ SsrfError::BlockedIp(_)) = check_host(&host, self.resolver.as_ref()).await {
                    return reject(issues, err.issue(), err.to_string(), Some(normalized));
                }
                return reject(
                    issues,
                    "suspicious_domain_pattern",
                    format!("suspicious domain pattern: {domain}"),
                    Some(normalized),
                );
            }

            if self.reader_host.as_deref() == Some(domain) {
                let tail = &parsed[url::Position::BeforePath..];
                if let Some(reason) = suspicious_reader_target(tail) {
                    issues.push(reason.to_string());
                    return reject(
                        issues,
                        "suspicious_domain_pattern",
                        format!("reader URL wraps an unusable target: {tail}"),
                        Some(normalized),
                    );
                }
            }
        }

        if let Err(err) = check_host(&host, self.resolver.as_ref()).await {
            return reject(issues, err.issue(), err.to_string(), Some(normalized));
        }

        if has_fixes {
            tracing::debug!(original = %raw, normalized = %normalized, ?issues, "URL repaired");
        }

        UrlValidation {
            valid: true,
            issues,
            original_url: raw.to_string(),
            normalized_url: Some(normalized),
            has_fixes,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    fn validator() -> UrlValidator {
        let resolver = StaticResolver::new()
            .with("docs.rs", IpAddr::V4(Ipv4Addr::new(151, 101, 2, 137)))
            .with("internal.corp.net", IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
            .with("metadata.cloud.net", IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)))
            .with("r.jina.ai", IpAddr::V4(Ipv4Addr::new(104, 21, 0, 1)));
        UrlValidator::new(Arc::new(resolver)).with_reader_host("r.jina.ai")
    }

    #[tokio::test]
    async fn test_valid_url_passes_unchanged() {
        let result = validator().validate("https://docs.rs/serde").await;
        assert!(result.valid);
        assert!(!result.has_fixes);
        assert!(result.issues.is_empty());
        assert_eq!(result.normalized_url.as_deref(), Some("https://docs.rs/serde"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_loopback_literal_rejected() {
        let result = validator().validate("http://127.0.0.1/admin").await;
        assert!(!result.valid);
        assert!(result.issues.contains(&"private_ip_detected".to_string()));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_private_resolution_rejected() {
        let result = validator().validate("https://internal.corp.net/wiki").await;
        assert!(!result.valid);
        assert_eq!(result.issues, vec!["private_ip_detected".to_string()]);

        let result = validator().validate("http://metadata.cloud.net/latest/meta-data").await;
        assert!(result.issues.contains(&"private_ip_detected".to_string()));
    }

    #[tokio::test]
    async fn test_forbidden_hostnames_rejected() {
        for url in ["http://localhost:8080/", "http://printer.local/status", "localhost/admin"] {
            let result = validator().validate(url).await;
            assert!(!result.valid, "{url} should be rejected");
            assert!(result.issues.contains(&"forbidden_hostname".to_string()), "{url}: {:?}", result.issues);
        }
    }

    #[tokio::test]
    async fn test_non_http_scheme_rejected() {
        for url in ["ftp://files.rs/a.tar", "file:///etc/passwd", "javascript:alert(1)"] {
            let result = validator().validate(url).await;
            assert!(!result.valid, "{url} should be rejected");
            assert!(result.issues.contains(&"invalid_protocol".to_string()), "{url}: {:?}", result.issues);
        }
    }

    #[tokio::test]
    async fn test_dot_substitution_repaired() {
        let result = validator().validate("https://docs dot rs/serde").await;
        assert!(result.valid);
        assert!(result.has_fixes);
        assert!(result.issues.contains(&"dot_substitution".to_string()));
        assert_eq!(result.normalized_url.as_deref(), Some("https://docs.rs/serde"));
    }

    #[tokio::test]
    async fn test_repaired_junk_domain_rejected() {
        let result = validator().validate("https://example dot com/page").await;
        assert!(!result.valid);
        assert!(result.has_fixes);
        assert!(result.issues.contains(&"suspicious_domain_pattern".to_string()));
    }

    #[tokio::test]
    async fn test_junk_name_resolving_inward_reports_private_ip() {
        let resolver = StaticResolver::new()
            .with("metadata", IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)))
            .with("example.com", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        let validator = UrlValidator::new(Arc::new(resolver));

        let result = validator.validate("http://metadata/latest/meta-data/").await;
        assert!(!result.valid);
        assert_eq!(result.issues, vec!["missing_tld".to_string(), "private_ip_detected".to_string()]);
        assert!(result.error.as_deref().is_some_and(|e| e.contains("169.254.169.254")));

        let result = validator.validate("https://example.com/").await;
        assert!(result.issues.contains(&"private_ip_detected".to_string()));

        // Unresolvable junk keeps the junk verdict.
        let result = validator.validate("http://intranet/").await;
        assert_eq!(result.issues, vec!["missing_tld".to_string(), "suspicious_domain_pattern".to_string()]);
    }

    #[tokio::test]
    async fn test_double_protocol_repaired() {
        let result = validator().validate("https://https://docs.rs/tokio").await;
        assert!(result.valid);
        assert!(result.has_fixes);
        assert_eq!(result.normalized_url.as_deref(), Some("https://docs.rs/tokio"));
    }

    #[tokio::test]
    async fn test_dns_failure_is_validation_failure() {
        let result = validator().validate("https://unresolvable.rs/").await;
        assert!(!result.valid);
        assert_eq!(result.issues, vec!["dns_lookup_failed".to_string()]);
    }

    #[tokio::test]
    async fn test_reader_proxy_with_fake_target_rejected() {
        let result = validator().validate("https://r.jina.ai/https://example.com").await;
        assert!(!result.valid);
        assert!(result.issues.contains(&"suspicious_domain_pattern".to_string()));

        let result = validator().validate("https://r.jina.ai/https://docs.rs/serde").await;
        assert!(result.valid);
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let result = validator().validate("   ").await;
        assert!(!result.valid);
        assert!(result.issues.contains(&"empty_url".to_string()));
        assert!(result.normalized_url.is_none());
    }
}
