//! Unified error types for resilex.
//!
//! Expected extraction failures never surface here: they are recorded as
//! attempt outcomes. These variants cover setup problems and bad tool input.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error types for the resilex engine and server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// HTTP client could not be constructed.
    #[error("HTTP_CLIENT: {0}")]
    HttpClient(String),

    /// Configuration could not be loaded or is invalid.
    #[error("CONFIG_ERROR: {0}")]
    Config(String),
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::HttpClient(msg) => (-32008, msg.clone()),
            Error::Config(msg) => (-32014, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("url cannot be empty".to_string());
        assert_eq!(err.to_string(), "INVALID_INPUT: url cannot be empty");
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::InvalidInput("urls cannot be empty".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_invalid_config_maps_to_config_error() {
        let config = crate::AppConfig { batch_concurrency: 0, ..Default::default() };
        let err: Error = config.validate().unwrap_err().into();
        assert!(err.to_string().starts_with("CONFIG_ERROR"));

        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32014);
    }
}
