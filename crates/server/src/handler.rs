//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the extraction engine.
use std::sync::Arc;

use crate::tools::web_batch_extract::{WebBatchExtractParams, batch_extract_impl};
use crate::tools::web_extract::{WebExtractParams, extract_impl};

use resilex_client::Engine;
use resilex_core::{AppConfig, Error};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for resilex.
#[derive(Clone)]
pub struct ResilexServer {
    tool_router: ToolRouter<Self>,
    engine: Arc<Engine>,
}

#[tool_router]
impl ResilexServer {
    /// Create a new server handler backed by one shared engine.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let engine = Engine::new(config)?;
        Ok(Self { tool_router: Self::tool_router(), engine: Arc::new(engine) })
    }

    /// Extract readable content from one URL.
    ///
    /// Tries the paid extractor, then the reader proxies, then caches and
    /// archives. The full attempt log is returned alongside the content.
    #[tool(
        description = "Extract readable content from a URL with automatic fallback across extraction services, \
                       web caches and archives. Returns content, quality verdict and attempt log."
    )]
    async fn web_extract(&self, params: Parameters<WebExtractParams>) -> Result<CallToolResult, McpError> {
        extract_impl(&self.engine, params.0).await
    }

    /// Extract readable content from many URLs in concurrent chunks.
    #[tool(
        description = "Extract readable content from multiple URLs. Runs in concurrent chunks and returns \
                       per-URL results in input order with a success summary."
    )]
    async fn web_batch_extract(&self, params: Parameters<WebBatchExtractParams>) -> Result<CallToolResult, McpError> {
        batch_extract_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for ResilexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "resilex".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
