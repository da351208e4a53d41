//! web_batch_extract tool implementation.
//!
//! Extracts multiple URLs in fixed-size concurrent chunks.

use std::sync::Arc;

use resilex_client::Engine;
use resilex_core::{Error, ExtractionOptions};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound on URLs per call.
pub const MAX_BATCH_URLS: usize = 100;

/// Upper bound on the per-chunk concurrency a caller may request.
pub const MAX_CONCURRENCY: usize = 16;

/// Input parameters for web_batch_extract tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WebBatchExtractParams {
    /// URLs to extract.
    pub urls: Vec<String>,

    /// Extraction options applied to every URL. `concurrency` sets the chunk
    /// size (default: 3, max: 16).
    #[serde(default)]
    pub options: ExtractionOptions,

    /// Include per-URL attempt logs in the output (default: false).
    #[serde(default)]
    pub include_attempts: bool,
}

/// Implementation of the web_batch_extract tool.
pub async fn batch_extract_impl(
    engine: &Arc<Engine>, params: WebBatchExtractParams,
) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(Error::InvalidInput("urls cannot be empty".into()).into());
    }

    if params.urls.len() > MAX_BATCH_URLS {
        return Err(Error::InvalidInput(format!(
            "too many urls: {} (max {MAX_BATCH_URLS})",
            params.urls.len()
        ))
        .into());
    }

    let mut options = params.options;
    options.concurrency = options.concurrency.map(|c| c.clamp(1, MAX_CONCURRENCY));

    let mut batch = engine.extract_batch(&params.urls, &options).await;
    if !params.include_attempts {
        for item in &mut batch.results {
            if let Some(response) = item.response.as_mut() {
                response.attempts.clear();
            }
        }
    }

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&batch).unwrap_or_default(),
    )]))
}
