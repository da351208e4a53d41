//! resilex server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use resilex_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    if !config.has_tavily_key() {
        tracing::warn!("TAVILY_API_KEY not set; primary extraction will fail over to reader proxies");
    }
    if !config.has_jina_key() {
        tracing::warn!("JINA_API_KEY not set; authenticated reader disabled");
    }

    tracing::info!(policy_404_mode = %config.policy_404_mode, "Starting resilex server on stdio transport");

    let handler = handler::ResilexServer::new(&config)?;
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
