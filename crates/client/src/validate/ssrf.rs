//! SSRF (Server-Side Request Forgery) protection.
//!
//! Validates that hostnames and resolved IP addresses are not pointing to
//! private, internal, or reserved addresses.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::LazyLock;

use async_trait::async_trait;
use ipnet::{Ipv4Net, Ipv6Net};
use url::Host;

/// Denied URL schemes that should never be fetched.
pub const DENIED_SCHEMES: &[&str] = &[
    "file",
    "ftp",
    "data",
    "javascript",
    "chrome",
    "about",
    "blob",
    "ws",
    "wss",
    "mailto",
    "gopher",
];

/// IPv4 ranges never reachable through the engine.
static BLOCKED_V4: LazyLock<Vec<Ipv4Net>> = LazyLock::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "224.0.0.0/4",
        "255.255.255.255/32",
    ]
    .iter()
    .filter_map(|cidr| cidr.parse().ok())
    .collect()
});

static BLOCKED_V6: LazyLock<Vec<Ipv6Net>> = LazyLock::new(|| {
    ["::/128", "::1/128", "fc00::/7", "fe80::/10", "ff00::/8"]
        .iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect()
});

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("forbidden hostname: {0}")]
    ForbiddenHostname(String),

    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),
}

impl SsrfError {
    /// Issue tag recorded in `UrlValidation::issues`.
    pub fn issue(&self) -> &'static str {
        match self {
            SsrfError::ForbiddenHostname(_) => "forbidden_hostname",
            SsrfError::BlockedIp(_) => "private_ip_detected",
            SsrfError::DnsError(_) => "dns_lookup_failed",
        }
    }
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Link-local addresses (169.254/16, fe80::/10), which includes cloud metadata endpoints
/// - Carrier-grade NAT (100.64/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
/// - IPv4-mapped IPv6 forms of all of the above
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => BLOCKED_V4.iter().any(|net| net.contains(&v4)),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_or_reserved(IpAddr::V4(v4)),
            None => BLOCKED_V6.iter().any(|net| net.contains(&v6)),
        },
    }
}

/// Validate that an IP address is not private or reserved.
///
/// Returns an error if the IP is blocked.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// `localhost`, anything under `.localhost`, and mDNS `.local` names.
pub fn is_forbidden_hostname(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == "localhost" || host.ends_with(".localhost") || host == "local" || host.ends_with(".local")
}

/// Hostname resolution seam so validation can run without real DNS.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, SsrfError>;
}

/// Resolver backed by the system's getaddrinfo via tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, SsrfError> {
        let addrs = tokio::net::lookup_host((host, 80))
            .await
            .map_err(|e| SsrfError::DnsError(format!("{host}: {e}")))?;
        let ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
        if ips.is_empty() {
            return Err(SsrfError::DnsError(format!("{host}: no addresses")));
        }
        Ok(ips)
    }
}

/// Fixed host table. Unknown hosts fail resolution.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    entries: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, ip: IpAddr) -> Self {
        self.entries.entry(host.to_ascii_lowercase()).or_default().push(ip);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, SsrfError> {
        self.entries
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| SsrfError::DnsError(format!("{host}: no such host")))
    }
}

/// Resolve `host` (literal IPs pass through) and require every answer be public.
pub async fn check_host(host: &Host<&str>, resolver: &dyn Resolver) -> Result<Vec<IpAddr>, SsrfError> {
    let ips = match host {
        Host::Ipv4(v4) => vec![IpAddr::V4(*v4)],
        Host::Ipv6(v6) => vec![IpAddr::V6(*v6)],
        Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(SsrfError::ForbiddenHostname(domain.to_string()));
            }
            resolver.resolve(domain).await?
        }
    };

    for ip in &ips {
        validate_ip(*ip)?;
    }

    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_is_private_or_reserved_loopback_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(127, 255, 255, 255))));
    }

    #[test]
    fn test_is_private_or_reserved_private_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 31, 255, 255))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 32, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_metadata_endpoint() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254))));
    }

    #[test]
    fn test_is_private_or_reserved_unspecified_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_mapped_v4() {
        let mapped = Ipv4Addr::new(127, 0, 0, 1).to_ipv6_mapped();
        assert!(is_private_or_reserved(IpAddr::V6(mapped)));

        let public = Ipv4Addr::new(93, 184, 216, 34).to_ipv6_mapped();
        assert!(!is_private_or_reserved(IpAddr::V6(public)));
    }

    #[test]
    fn test_is_private_or_reserved_public() {
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))));
        assert!(!is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(
            0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 1
        ))));
    }

    #[test]
    fn test_forbidden_hostnames() {
        assert!(is_forbidden_hostname("localhost"));
        assert!(is_forbidden_hostname("LOCALHOST."));
        assert!(is_forbidden_hostname("printer.local"));
        assert!(is_forbidden_hostname("api.localhost"));
        assert!(!is_forbidden_hostname("localhost.dev"));
        assert!(!is_forbidden_hostname("docs.rs"));
    }

    #[test]
    fn test_issue_tags() {
        assert_eq!(SsrfError::BlockedIp(IpAddr::V4(Ipv4Addr::LOCALHOST)).issue(), "private_ip_detected");
        assert_eq!(SsrfError::DnsError("x".into()).issue(), "dns_lookup_failed");
        assert_eq!(SsrfError::ForbiddenHostname("localhost".into()).issue(), "forbidden_hostname");
    }

    #[tokio::test]
    async fn test_check_host_literal_ip_skips_resolver() {
        let resolver = StaticResolver::new();
        let host = Host::Ipv4(Ipv4Addr::new(8, 8, 8, 8));
        let ips = check_host(&host, &resolver).await.unwrap();
        assert_eq!(ips, vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))]);
    }

    #[tokio::test]
    async fn test_check_host_rejects_any_private_answer() {
        let resolver = StaticResolver::new()
            .with("rebind.attacker.net", IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)))
            .with("rebind.attacker.net", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        let result = check_host(&Host::Domain("rebind.attacker.net"), &resolver).await;
        assert!(matches!(result, Err(SsrfError::BlockedIp(_))));
    }

    #[tokio::test]
    async fn test_check_host_unknown_domain() {
        let resolver = StaticResolver::new();
        let result = check_host(&Host::Domain("nowhere.rs"), &resolver).await;
        assert!(matches!(result, Err(SsrfError::DnsError(_))));
    }
}
