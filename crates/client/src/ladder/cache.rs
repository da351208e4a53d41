//! Web-cache and archive mirrors.
//!
//! Most services are a pure URL template. The Wayback availability API is
//! different: it needs a network round-trip to learn whether a snapshot
//! exists and where it lives, so it is an async lookup.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::backends::Backends;

/// What a lookup may touch.
pub struct LookupContext<'a> {
    pub backends: &'a Backends,
    pub wayback_api: &'a str,
    pub timeout: Duration,
}

/// How a cache service turns a target URL into a fetchable URL.
#[derive(Clone, Copy)]
pub enum CacheLookup {
    /// Pure URL rewrite.
    Template(fn(&str) -> String),
    /// Network pre-check; `None` when nothing is cached.
    AsyncLookup(for<'a> fn(&'a LookupContext<'a>, &'a str) -> BoxFuture<'a, Option<String>>),
}

impl std::fmt::Debug for CacheLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheLookup::Template(_) => f.write_str("Template"),
            CacheLookup::AsyncLookup(_) => f.write_str("AsyncLookup"),
        }
    }
}

/// A named cache or archive mirror.
#[derive(Debug, Clone, Copy)]
pub struct CacheService {
    pub name: &'static str,
    pub lookup: CacheLookup,
}

impl CacheService {
    /// URL to fetch for `target`, if the service has one.
    pub async fn resolve(&self, ctx: &LookupContext<'_>, target: &str) -> Option<String> {
        match self.lookup {
            CacheLookup::Template(template) => Some(template(target)),
            CacheLookup::AsyncLookup(lookup) => lookup(ctx, target).await,
        }
    }
}

fn encode(target: &str) -> String {
    url::form_urlencoded::byte_serialize(target.as_bytes()).collect()
}

fn google_cache(target: &str) -> String {
    format!("https://webcache.googleusercontent.com/search?q=cache:{}", encode(target))
}

fn archive_today(target: &str) -> String {
    format!("https://archive.ph/newest/{target}")
}

fn wayback_direct(target: &str) -> String {
    format!("https://web.archive.org/web/2/{target}")
}

fn bing_cache(target: &str) -> String {
    format!("https://cc.bingj.com/cache.aspx?url={}", encode(target))
}

fn wayback_available<'a>(ctx: &'a LookupContext<'a>, target: &'a str) -> BoxFuture<'a, Option<String>> {
    Box::pin(async move {
        let endpoint = format!("{}/wayback/available", ctx.wayback_api.trim_end_matches('/'));
        let response = ctx
            .backends
            .http()
            .get(&endpoint)
            .query(&[("url", target)])
            .timeout(ctx.timeout)
            .send()
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "wayback availability lookup failed"))
            .ok()?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "wayback availability lookup rejected");
            return None;
        }

        let body: Value = response.json().await.ok()?;
        snapshot_url(&body)
    })
}

/// `archived_snapshots.closest.url` of an availability response, if the snapshot is usable.
pub fn snapshot_url(body: &Value) -> Option<String> {
    let closest = body.pointer("/archived_snapshots/closest")?;
    if closest.get("available").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    closest.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()).map(str::to_string)
}

/// Every known service, in default priority order.
pub static CATALOG: [CacheService; 5] = [
    CacheService { name: "google_cache", lookup: CacheLookup::Template(google_cache) },
    CacheService { name: "wayback_available", lookup: CacheLookup::AsyncLookup(wayback_available) },
    CacheService { name: "archive_today", lookup: CacheLookup::Template(archive_today) },
    CacheService { name: "wayback_direct", lookup: CacheLookup::Template(wayback_direct) },
    CacheService { name: "bing_cache", lookup: CacheLookup::Template(bing_cache) },
];

/// Services named in `names`, in that order. Unknown names are skipped.
pub fn select(names: &[String]) -> Vec<&'static CacheService> {
    names
        .iter()
        .filter_map(|name| {
            let found = CATALOG.iter().find(|s| s.name == name.trim());
            if found.is_none() {
                tracing::warn!(service = %name, "unknown cache service ignored");
            }
            found
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_templates() {
        let target = "https://docs.rs/serde?x=1";
        assert_eq!(
            google_cache(target),
            "https://webcache.googleusercontent.com/search?q=cache:https%3A%2F%2Fdocs.rs%2Fserde%3Fx%3D1"
        );
        assert_eq!(archive_today(target), "https://archive.ph/newest/https://docs.rs/serde?x=1");
        assert_eq!(wayback_direct(target), "https://web.archive.org/web/2/https://docs.rs/serde?x=1");
        assert!(bing_cache(target).starts_with("https://cc.bingj.com/cache.aspx?url=https%3A%2F%2F"));
    }

    #[test]
    fn test_snapshot_url() {
        let body = json!({
            "archived_snapshots": {
                "closest": {"available": true, "url": "http://web.archive.org/web/2024/https://docs.rs/", "status": "200"}
            }
        });
        assert_eq!(snapshot_url(&body).as_deref(), Some("http://web.archive.org/web/2024/https://docs.rs/"));

        assert_eq!(snapshot_url(&json!({"archived_snapshots": {}})), None);
        assert_eq!(snapshot_url(&json!({"archived_snapshots": {"closest": {"available": false, "url": "x"}}})), None);
    }

    #[test]
    fn test_select_preserves_order_and_skips_unknown() {
        let names = vec!["wayback_direct".to_string(), "nope".to_string(), "google_cache".to_string()];
        let selected = select(&names);
        let got: Vec<_> = selected.iter().map(|s| s.name).collect();
        assert_eq!(got, vec!["wayback_direct", "google_cache"]);
    }

    #[test]
    fn test_only_wayback_availability_is_async() {
        let async_names: Vec<_> =
            CATALOG.iter().filter(|s| matches!(s.lookup, CacheLookup::AsyncLookup(_))).map(|s| s.name).collect();
        assert_eq!(async_names, vec!["wayback_available"]);
    }
}
