//! Browser header profiles used to retry blocked requests.

use std::collections::BTreeMap;

use crate::policy::{RandomSource, shuffle};

/// One browser identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderProfile {
    pub name: &'static str,
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
}

pub const PROFILES: &[HeaderProfile] = &[
    HeaderProfile {
        name: "chrome_windows",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
    },
    HeaderProfile {
        name: "firefox_linux",
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.5",
    },
    HeaderProfile {
        name: "safari_macos",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-GB,en;q=0.9",
    },
    HeaderProfile {
        name: "mobile_safari",
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
    },
    HeaderProfile {
        name: "edge_windows",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.8",
    },
];

impl HeaderProfile {
    /// `base` with this profile's identity headers layered on top.
    pub fn apply(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut headers: BTreeMap<String, String> = base
            .iter()
            .filter(|(k, _)| {
                !["user-agent", "accept", "accept-language"].contains(&k.to_ascii_lowercase().as_str())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.insert("User-Agent".into(), self.user_agent.into());
        headers.insert("Accept".into(), self.accept.into());
        headers.insert("Accept-Language".into(), self.accept_language.into());
        headers
    }
}

/// All profiles in a random order.
pub fn rotated(rng: &dyn RandomSource) -> Vec<&'static HeaderProfile> {
    let mut profiles: Vec<&'static HeaderProfile> = PROFILES.iter().collect();
    shuffle(&mut profiles, rng);
    profiles
}
