//! Content-extraction backends.
//!
//! Three capability-equivalent services behind one call:
//!
//! - **tavily**: paid extraction API, `POST {base}/extract` with a bearer key.
//! - **jina_reader**: free reader proxy, `GET {reader}/{url}`; the body is the content.
//! - **jina_auth**: the same reader via `POST {reader}/` with a bearer key and a
//!   JSON envelope carrying token usage.
//!
//! `Backends::extract` never fails. Every error path (non-2xx, network, bad
//! payload, missing credential) becomes an `AttemptResult` with `success=false`
//! and a canonical code.

pub mod error;
pub mod reader;
pub mod tavily;

pub use error::{BackendError, error_chain, extract_error_code};

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HOST, HeaderMap, HeaderName, HeaderValue};
use resilex_core::{AppConfig, AttemptResult, Error, ExtractionOptions};

/// Body excerpt kept in HTTP error messages.
const ERROR_BODY_CHARS: usize = 200;

/// Cost tier of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostTier {
    Free,
    Metered,
    Paid,
}

/// Static metadata used for strategy selection. Never mutated.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    /// Historical fraction of successful extractions.
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub cost: CostTier,
    pub requires_auth: bool,
    pub best_for: &'static [&'static str],
}

static TAVILY: ServiceDescriptor = ServiceDescriptor {
    name: "tavily",
    success_rate: 0.95,
    avg_latency_ms: 1_800,
    cost: CostTier::Paid,
    requires_auth: true,
    best_for: &["news", "articles", "general"],
};

static JINA_READER: ServiceDescriptor = ServiceDescriptor {
    name: "jina_reader",
    success_rate: 0.88,
    avg_latency_ms: 2_500,
    cost: CostTier::Free,
    requires_auth: false,
    best_for: &["documentation", "blogs", "reference"],
};

static JINA_AUTH: ServiceDescriptor = ServiceDescriptor {
    name: "jina_auth",
    success_rate: 0.92,
    avg_latency_ms: 2_200,
    cost: CostTier::Metered,
    requires_auth: true,
    best_for: &["documentation", "high_volume"],
};

/// One of the three extraction services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Tavily,
    JinaReader,
    JinaAuth,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Tavily, Backend::JinaReader, Backend::JinaAuth];

    pub fn descriptor(&self) -> &'static ServiceDescriptor {
        match self {
            Backend::Tavily => &TAVILY,
            Backend::JinaReader => &JINA_READER,
            Backend::JinaAuth => &JINA_AUTH,
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Content pulled out of a backend payload.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub content: String,
    pub title: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Extracted {
    fn into_attempt(self, service: &str, url: &str, elapsed_ms: u64) -> AttemptResult {
        let mut attempt = AttemptResult::succeeded(service, url, self.content, elapsed_ms).with_title(self.title);
        attempt.metadata = self.metadata;
        attempt
    }
}

/// Shared HTTP client plus the endpoints and credentials of every backend.
#[derive(Debug, Clone)]
pub struct Backends {
    http: reqwest::Client,
    tavily_base: String,
    reader_base: String,
    tavily_key: Option<String>,
    jina_key: Option<String>,
}

impl Backends {
    /// Build the backend set from configuration.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            tavily_base: config.tavily_base_url.trim_end_matches('/').to_string(),
            reader_base: config.reader_base_url.trim_end_matches('/').to_string(),
            tavily_key: config.require_tavily_api_key().ok().map(str::to_string),
            jina_key: config.jina_api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn reader_base(&self) -> &str {
        &self.reader_base
    }

    pub fn tavily_base(&self) -> &str {
        &self.tavily_base
    }

    pub fn tavily_key(&self) -> Option<&str> {
        self.tavily_key.as_deref()
    }

    pub fn jina_key(&self) -> Option<&str> {
        self.jina_key.as_deref()
    }

    /// Whether `backend` can be called at all.
    pub fn is_configured(&self, backend: Backend) -> bool {
        match backend {
            Backend::Tavily => self.tavily_key.is_some(),
            Backend::JinaReader => true,
            Backend::JinaAuth => self.jina_key.is_some(),
        }
    }

    /// Reader-proxy URL for `target`: `{reader}/{target}`.
    pub fn reader_url(&self, target: &str) -> String {
        format!("{}/{}", self.reader_base, target)
    }

    /// Run one extraction against `backend`.
    ///
    /// `headers` are merged into the outbound request on top of the client
    /// defaults; pass `&options.headers` for a standard attempt.
    pub async fn extract(
        &self, backend: Backend, url: &str, options: &ExtractionOptions, headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> AttemptResult {
        let start = Instant::now();

        let outcome = match backend {
            Backend::Tavily => match self.tavily_key.as_deref() {
                Some(key) => tavily::extract(self, key, url, options, headers, timeout).await,
                None => Err(BackendError::MissingApiKey("TAVILY_API_KEY")),
            },
            Backend::JinaReader => reader::fetch(self, &self.reader_url(url), headers, timeout).await,
            Backend::JinaAuth => match self.jina_key.as_deref() {
                Some(key) => reader::extract_auth(self, key, url, headers, timeout).await,
                None => Err(BackendError::MissingApiKey("JINA_API_KEY")),
            },
        };

        finish(backend.name(), url, outcome, start)
    }

    /// GET an already-built reader URL, reporting the attempt under `service`.
    ///
    /// Used by the escalation ladder for cache mirrors and alternate URL shapes.
    pub async fn fetch_reader_url(
        &self, service: &str, reader_url: &str, reported_url: &str, headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> AttemptResult {
        let start = Instant::now();
        let outcome = reader::fetch(self, reader_url, headers, timeout).await;
        finish(service, reported_url, outcome, start).with_metadata("reader_url", reader_url.into())
    }
}

fn finish(service: &str, url: &str, outcome: Result<Extracted, BackendError>, start: Instant) -> AttemptResult {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(extracted) => {
            tracing::debug!(service, url, chars = extracted.content.chars().count(), elapsed_ms, "attempt succeeded");
            extracted.into_attempt(service, url, elapsed_ms)
        }
        Err(err) => {
            let code = err.code();
            tracing::debug!(service, url, %code, error = %err, elapsed_ms, "attempt failed");
            AttemptResult::failed(service, url, code, err.to_string(), elapsed_ms)
        }
    }
}

/// Headers callers may not override.
fn is_protected(name: &HeaderName) -> bool {
    [AUTHORIZATION, CONTENT_TYPE, CONTENT_LENGTH, HOST].contains(name)
}

/// Apply caller headers, replacing same-named request headers.
///
/// Invalid and protected headers are skipped.
pub(crate) fn with_headers(
    request: reqwest::RequestBuilder, headers: &BTreeMap<String, String>,
) -> reqwest::RequestBuilder {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(_)) if is_protected(&name) => {
                tracing::debug!(header = %name, "refusing to override protected header")
            }
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "skipping invalid header"),
        }
    }
    request.headers(map)
}

/// Send `request`, turning non-2xx into `BackendError::Http`.
pub(crate) async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.trim().chars().take(ERROR_BODY_CHARS).collect();
    Err(BackendError::Http { status: status.as_u16(), body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_are_static() {
        assert_eq!(Backend::Tavily.name(), "tavily");
        assert_eq!(Backend::JinaReader.name(), "jina_reader");
        assert_eq!(Backend::JinaAuth.name(), "jina_auth");
        assert!(Backend::Tavily.descriptor().requires_auth);
        assert!(!Backend::JinaReader.descriptor().requires_auth);
        assert_eq!(Backend::JinaReader.descriptor().cost, CostTier::Free);
    }

    #[test]
    fn test_with_headers_replaces_and_protects() {
        let client = reqwest::Client::new();
        let request = client
            .post("http://localhost/extract")
            .bearer_auth("tvly-key")
            .header(reqwest::header::ACCEPT, "application/json");

        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "text/html".to_string());
        headers.insert("authorization".to_string(), "Bearer other".to_string());
        headers.insert("X-Trace".to_string(), "abc".to_string());
        headers.insert("bad header".to_string(), "x".to_string());

        let built = with_headers(request, &headers).build().unwrap();
        let sent = built.headers();
        assert_eq!(sent.get_all(reqwest::header::ACCEPT).iter().count(), 1);
        assert_eq!(sent[reqwest::header::ACCEPT], "text/html");
        assert_eq!(sent.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(sent[AUTHORIZATION], "Bearer tvly-key");
        assert_eq!(sent["x-trace"], "abc");
    }

    #[test]
    fn test_backends_trim_base_urls() {
        let config = AppConfig { reader_base_url: "https://r.jina.ai/".into(), ..Default::default() };
        let backends = Backends::new(&config).unwrap();
        assert_eq!(backends.reader_url("https://docs.rs/serde"), "https://r.jina.ai/https://docs.rs/serde");
    }

    #[test]
    fn test_is_configured_follows_keys() {
        let backends = Backends::new(&AppConfig::default()).unwrap();
        assert!(!backends.is_configured(Backend::Tavily));
        assert!(backends.is_configured(Backend::JinaReader));
        assert!(!backends.is_configured(Backend::JinaAuth));

        let config = AppConfig { jina_api_key: Some("jina_key".into()), ..Default::default() };
        assert!(Backends::new(&config).unwrap().is_configured(Backend::JinaAuth));
    }

    #[tokio::test]
    async fn test_missing_key_is_a_failed_attempt() {
        let backends = Backends::new(&AppConfig::default()).unwrap();
        let options = ExtractionOptions::default();
        let attempt = backends
            .extract(Backend::Tavily, "https://docs.rs/serde", &options, &options.headers, Duration::from_secs(1))
            .await;
        assert!(!attempt.success);
        assert_eq!(attempt.service, "tavily");
        assert_eq!(attempt.error_code(), Some(resilex_core::ErrorCode::MissingApiKey));
    }
}
