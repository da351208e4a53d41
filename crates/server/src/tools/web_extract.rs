//! web_extract tool implementation.
//!
//! Runs one URL through the resilient extraction engine.

use resilex_client::Engine;
use resilex_core::{Error, ExtractionOptions, ExtractionResponse};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for web_extract tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebExtractParams {
    /// The URL to extract content from.
    pub url: String,

    /// Extraction options (fallback behavior, 404 policy, headers).
    #[serde(default)]
    pub options: ExtractionOptions,

    /// Include the full attempt log in the output (default: true).
    #[serde(default = "default_true")]
    pub include_attempts: bool,
}

fn default_true() -> bool {
    true
}

/// Implementation of the web_extract tool.
pub async fn extract_impl(engine: &Engine, params: WebExtractParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let mut response = engine.extract_content(&params.url, &params.options).await;
    if !params.include_attempts {
        response.attempts.clear();
    }

    Ok(render(&response))
}

/// Failed extractions are still reported as tool output; the caller reads
/// `technical_success` and `error` from the payload.
fn render(response: &ExtractionResponse) -> CallToolResult {
    let body = serde_json::to_string_pretty(response).unwrap_or_default();
    if response.technical_success {
        CallToolResult::success(vec![Content::text(body)])
    } else {
        CallToolResult::error(vec![Content::text(body)])
    }
}
