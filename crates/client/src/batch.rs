//! Batch extraction over many URLs.
//!
//! URLs run in fixed-size chunks. Every URL in a chunk runs concurrently; the
//! next chunk starts after the whole chunk finished plus a fixed delay.
//! Results keep input order.

use std::sync::Arc;

use resilex_core::{ExtractionOptions, ExtractionResponse};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;

/// Outcome for one input URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ExtractionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage of successful URLs; 0 for an empty batch.
    pub success_rate: f64,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let total = items.len();
        let successful = items.iter().filter(|i| i.success).count();
        let success_rate = if total == 0 { 0.0 } else { successful as f64 / total as f64 * 100.0 };
        Self { total, successful, failed: total - successful, success_rate }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub summary: BatchSummary,
}

impl BatchItem {
    fn from_response(url: String, response: ExtractionResponse, cost_tracking: bool) -> Self {
        let success = response.result.success && (response.result.content_length > 0 || cost_tracking);
        Self { url, success, response: Some(response), error: None }
    }

    fn failed(url: String, error: impl Into<String>) -> Self {
        Self { url, success: false, response: None, error: Some(error.into()) }
    }
}

impl Engine {
    /// Extract every URL in `urls`, preserving input order.
    pub async fn extract_batch(self: &Arc<Self>, urls: &[String], options: &ExtractionOptions) -> BatchResponse {
        let chunk_size = options.concurrency.unwrap_or(self.config().batch_concurrency).max(1);
        let delay = self.config().batch_delay();
        let cost_tracking = options.wants_cost_tracking();
        let chunk_count = urls.len().div_ceil(chunk_size);

        tracing::info!(total = urls.len(), chunk_size, chunk_count, "batch extraction started");

        let mut results = Vec::with_capacity(urls.len());
        for (index, chunk) in urls.chunks(chunk_size).enumerate() {
            let handles: Vec<_> = chunk
                .iter()
                .map(|url| {
                    let engine = Arc::clone(self);
                    let url = url.clone();
                    let options = options.clone();
                    tokio::spawn(async move { engine.extract_content(&url, &options).await })
                })
                .collect();

            for (url, joined) in chunk.iter().zip(futures_util::future::join_all(handles).await) {
                let item = match joined {
                    Ok(response) => BatchItem::from_response(url.clone(), response, cost_tracking),
                    Err(e) => {
                        tracing::error!(url = %url, error = %e, "batch task failed");
                        BatchItem::failed(url.clone(), format!("task failed: {e}"))
                    }
                };
                results.push(item);
            }

            if index + 1 < chunk_count && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let summary = BatchSummary::from_items(&results);
        tracing::info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "batch extraction finished"
        );
        BatchResponse { results, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(success: bool) -> BatchItem {
        BatchItem { url: "https://docs.rs/".into(), success, response: None, error: None }
    }

    #[test]
    fn test_summary_counts() {
        let summary = BatchSummary::from_items(&[item(true), item(false), item(true), item(true)]);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.successful, 3);
        assert_eq!(summary.failed, 1);
        assert!((summary.success_rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(BatchSummary::from_items(&[]), BatchSummary::default());
    }

    #[test]
    fn test_failed_item_serializes_error_only() {
        let json = serde_json::to_value(BatchItem::failed("https://x.dev/".into(), "task failed: boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "task failed: boom");
        assert!(json.get("response").is_none());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let engine = Arc::new(Engine::new(&resilex_core::AppConfig::default()).unwrap());
        let out = engine.extract_batch(&[], &ExtractionOptions::default()).await;
        assert!(out.results.is_empty());
        assert_eq!(out.summary.total, 0);
    }
}
