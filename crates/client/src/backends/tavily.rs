//! Tavily Extract API.
//!
//! - **Endpoint**: `POST {base}/extract`
//! - **Authentication**: `Authorization: Bearer <key>`
//! - **Body**: `{"urls": [url], "extract_depth"?, "include_images"?}`
//! - **Content**: `results[0].content`, else `results[0].raw_content`.
//!   A non-empty `failed_results` with no results is an extraction failure.

use std::collections::BTreeMap;
use std::time::Duration;

use resilex_core::{ExtractDepth, ExtractionOptions};
use serde::{Deserialize, Serialize};

use super::{BackendError, Backends, Extracted, send, with_headers};

/// Request body for the extract endpoint.
#[derive(Debug, Serialize)]
pub struct ExtractRequest<'a> {
    pub urls: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_depth: Option<ExtractDepth>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_images: bool,
}

/// Raw extract response.
#[derive(Debug, Deserialize)]
pub struct ExtractResponse {
    #[serde(default)]
    pub results: Vec<ExtractedPage>,
    #[serde(default)]
    pub failed_results: Vec<FailedPage>,
    #[serde(default)]
    pub response_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractedPage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailedPage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExtractResponse {
    /// Pull the first page's content out of the payload.
    pub fn into_extracted(self) -> Result<Extracted, BackendError> {
        let mut metadata = serde_json::Map::new();
        if let Some(secs) = self.response_time {
            metadata.insert("api_response_time".into(), secs.into());
        }

        let Some(page) = self.results.into_iter().next() else {
            if let Some(failed) = self.failed_results.into_iter().next() {
                let reason = failed.error.unwrap_or_else(|| "no reason given".into());
                return Err(BackendError::Failed(reason));
            }
            return Ok(Extracted { metadata, ..Default::default() });
        };

        let content = page.content.filter(|c| !c.is_empty()).or(page.raw_content).unwrap_or_default();
        if !page.images.is_empty() {
            metadata.insert("images".into(), page.images.into());
        }
        if let Some(url) = page.url {
            metadata.insert("resolved_url".into(), url.into());
        }

        Ok(Extracted { content, title: page.title.filter(|t| !t.is_empty()), metadata })
    }
}

/// Extract `url` through the paid API.
pub async fn extract(
    backends: &Backends, key: &str, url: &str, options: &ExtractionOptions, headers: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<Extracted, BackendError> {
    let body = ExtractRequest { urls: [url], extract_depth: options.extract_depth, include_images: options.include_images };

    let request = backends
        .http()
        .post(format!("{}/extract", backends.tavily_base()))
        .bearer_auth(key)
        .header(reqwest::header::ACCEPT, "application/json")
        .timeout(timeout)
        .json(&body);

    let response = send(with_headers(request, headers)).await?;
    let bytes = response.bytes().await?;
    let payload: ExtractResponse =
        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

    payload.into_extracted()
}

/// Minimal authenticated call used by the health prober.
pub async fn probe(backends: &Backends, key: &str, target: &str, timeout: Duration) -> Result<(), BackendError> {
    let body = ExtractRequest { urls: [target], extract_depth: Some(ExtractDepth::Basic), include_images: false };
    let request = backends
        .http()
        .post(format!("{}/extract", backends.tavily_base()))
        .bearer_auth(key)
        .timeout(timeout)
        .json(&body);

    send(request).await.map(|_| ())
}
