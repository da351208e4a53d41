//! Core types and shared functionality for resilex.
//!
//! This crate provides:
//! - Records exchanged with the extraction engine
//! - Unified error types
//! - Layered configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use types::*;
