//! MCP tool implementations.
//!
//! This module contains all tools exposed by the resilex server.

pub mod web_batch_extract;
pub mod web_extract;
