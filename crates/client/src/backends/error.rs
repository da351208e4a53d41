//! Backend error types and canonical code classification.

use resilex_core::ErrorCode;

/// Errors raised inside a single backend call.
///
/// These never leave the backend layer: `Backends::extract` folds them into a
/// failed `AttemptResult` carrying the classified code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// Credential required by this backend is not configured.
    #[error("missing API key: {0} not set")]
    MissingApiKey(&'static str),

    /// Non-2xx response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Request timeout.
    #[error("TIMEOUT: request timed out")]
    Timeout,

    /// Network error, with the full source chain rendered.
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered 2xx with a payload we cannot use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Backend reported a per-URL failure inside a 2xx payload.
    #[error("extraction failed: {0}")]
    Failed(String),
}

impl BackendError {
    /// Canonical code for this failure.
    ///
    /// HTTP failures are classified by status; only the body is searched for
    /// keyword markers, never for status numbers.
    pub fn code(&self) -> ErrorCode {
        match self {
            BackendError::MissingApiKey(_) => ErrorCode::MissingApiKey,
            BackendError::InvalidResponse(_) => ErrorCode::InvalidResponse,
            BackendError::Timeout => ErrorCode::Timeout,
            BackendError::Http { status, body } => status_code(*status).unwrap_or_else(|| keyword_code(body)),
            BackendError::Network(message) => keyword_code(message),
            BackendError::Failed(message) => extract_error_code(message),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return BackendError::Timeout;
        }
        // The request URL embeds the target URL; keep it out of the message.
        let err = err.without_url();
        BackendError::Network(error_chain(&err))
    }
}

/// Code for an HTTP status with a dedicated code.
pub fn status_code(status: u16) -> Option<ErrorCode> {
    match status {
        400 => Some(ErrorCode::BadRequest),
        401 => Some(ErrorCode::Unauthorized),
        403 => Some(ErrorCode::Forbidden403),
        404 => Some(ErrorCode::NotFound),
        408 | 504 => Some(ErrorCode::Timeout),
        429 => Some(ErrorCode::RateLimited),
        451 => Some(ErrorCode::LegalBlock),
        _ => None,
    }
}

/// Render an error with all of its sources, e.g. `error sending request: ... : Connection refused`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}

/// Map a raw error message onto a canonical code.
///
/// Substring match, first hit wins, in this order: `401`, `403`, `429`, `451`,
/// `400`, `404`, timeout, connection refused, `HEADER_CHECK`,
/// `SECURITY_COMPROMISE`, `FORBIDDEN`.
pub fn extract_error_code(message: &str) -> ErrorCode {
    let upper = message.to_uppercase();
    let has = |needle: &str| upper.contains(needle);

    if has("401") {
        ErrorCode::Unauthorized
    } else if has("403") {
        ErrorCode::Forbidden403
    } else if has("429") {
        ErrorCode::RateLimited
    } else if has("451") {
        ErrorCode::LegalBlock
    } else if has("400") {
        ErrorCode::BadRequest
    } else if has("404") {
        ErrorCode::NotFound
    } else {
        keyword_code(message)
    }
}

/// The non-numeric part of [`extract_error_code`]: timeout, connection
/// refused, `HEADER_CHECK`, `SECURITY_COMPROMISE`, `FORBIDDEN`.
pub fn keyword_code(message: &str) -> ErrorCode {
    let upper = message.to_uppercase();
    let has = |needle: &str| upper.contains(needle);

    if has("TIMEOUT") || has("TIMED OUT") {
        ErrorCode::Timeout
    } else if has("ECONNREFUSED") || has("CONNECTION REFUSED") {
        ErrorCode::ConnectionRefused
    } else if has("HEADER_CHECK") {
        ErrorCode::HeaderCheck
    } else if has("SECURITY_COMPROMISE") || has("SECURITYCOMPROMISE") {
        ErrorCode::SecurityCompromise
    } else if has("FORBIDDEN") {
        ErrorCode::Forbidden
    } else {
        ErrorCode::Unknown
    }
}
