//! Records exchanged between the extraction engine and its callers.
//!
//! Everything here is plain data: produced once, never mutated after it is
//! handed back. Field names serialize as snake_case; the camelCase aliases
//! accept option bags written for the older plugin harness.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Extraction depth passed through to the primary backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractDepth {
    Basic,
    Advanced,
}

/// Per-call options. Immutable for the duration of one extraction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionOptions {
    /// Prefer the token-tracked backend as fallback.
    #[serde(default, alias = "costTracking")]
    pub cost_tracking: bool,

    /// Same effect as `cost_tracking`.
    #[serde(default, alias = "highVolume")]
    pub high_volume: bool,

    /// Do not fall back when the primary returns zero-length content.
    #[serde(default, alias = "skipEmptyFallback")]
    pub skip_empty_fallback: bool,

    /// Probe backends before extracting (default: true).
    #[serde(default = "default_true", alias = "performHealthCheck")]
    pub perform_health_check: bool,

    /// 404/archive policy overrides for this call.
    #[serde(default, alias = "config404")]
    pub config_404: Option<Policy404Overrides>,

    /// Cap on cache-service attempts (clamped to 0..=5).
    #[serde(default, alias = "maxArchiveAttempts")]
    pub max_archive_attempts: Option<i64>,

    /// Extra headers merged into every outbound backend request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Primary backend extraction depth.
    #[serde(default, alias = "extractDepth")]
    pub extract_depth: Option<ExtractDepth>,

    /// Ask the primary backend to include image URLs.
    #[serde(default, alias = "includeImages")]
    pub include_images: bool,

    /// Batch chunk size (default: 3).
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Per-attempt timeout override in milliseconds.
    #[serde(default, alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            cost_tracking: false,
            high_volume: false,
            skip_empty_fallback: false,
            perform_health_check: true,
            config_404: None,
            max_archive_attempts: None,
            headers: BTreeMap::new(),
            extract_depth: None,
            include_images: false,
            concurrency: None,
            timeout_ms: None,
        }
    }
}

impl ExtractionOptions {
    /// Whether the caller asked for token-tracked extraction.
    pub fn wants_cost_tracking(&self) -> bool {
        self.cost_tracking || self.high_volume
    }
}

/// Explicit per-domain archive rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DomainRule {
    Always,
    Try,
    Never,
}

/// Caller-supplied adjustments applied on top of a policy preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Policy404Overrides {
    /// Preset name: disabled | conservative | normal | aggressive.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, alias = "archiveProbability")]
    pub archive_probability: Option<f64>,
    #[serde(default, alias = "maxArchiveAttempts")]
    pub max_archive_attempts: Option<i64>,
    #[serde(default, alias = "highValueDomains")]
    pub high_value_domains: Option<Vec<String>>,
    #[serde(default, alias = "lowValuePatterns")]
    pub low_value_patterns: Option<Vec<String>>,
    #[serde(default, alias = "customRules")]
    pub custom_rules: BTreeMap<String, DomainRule>,
}

/// Effective 404/archive policy for one call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Policy404Config {
    pub enabled: bool,
    pub archive_probability: f64,
    pub max_archive_attempts: u8,
    pub high_value_domains: Vec<String>,
    pub low_value_patterns: Vec<String>,
    pub custom_rules: BTreeMap<String, DomainRule>,
}

/// Canonical backend error codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    #[serde(rename = "400")]
    BadRequest,
    #[serde(rename = "401")]
    Unauthorized,
    #[serde(rename = "403")]
    Forbidden403,
    #[serde(rename = "404")]
    NotFound,
    #[serde(rename = "429")]
    RateLimited,
    #[serde(rename = "451")]
    LegalBlock,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "ECONNREFUSED")]
    ConnectionRefused,
    #[serde(rename = "HEADER_CHECK")]
    HeaderCheck,
    #[serde(rename = "SECURITY_COMPROMISE")]
    SecurityCompromise,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "MISSING_API_KEY")]
    MissingApiKey,
    #[serde(rename = "INVALID_RESPONSE")]
    InvalidResponse,
    #[serde(rename = "EXCEPTION")]
    Exception,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "400",
            ErrorCode::Unauthorized => "401",
            ErrorCode::Forbidden403 => "403",
            ErrorCode::NotFound => "404",
            ErrorCode::RateLimited => "429",
            ErrorCode::LegalBlock => "451",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ConnectionRefused => "ECONNREFUSED",
            ErrorCode::HeaderCheck => "HEADER_CHECK",
            ErrorCode::SecurityCompromise => "SECURITY_COMPROMISE",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::MissingApiKey => "MISSING_API_KEY",
            ErrorCode::InvalidResponse => "INVALID_RESPONSE",
            ErrorCode::Exception => "EXCEPTION",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Credential problems: retrying the same backend with other headers is pointless.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ErrorCode::Unauthorized | ErrorCode::Forbidden403 | ErrorCode::Forbidden | ErrorCode::MissingApiKey
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure attached to an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AttemptError {
    pub code: ErrorCode,
    pub message: String,
}

/// Orchestration stage that produced an attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Primary,
    Fallback,
    FinalFallback,
    Escalation,
}

/// Outcome of one backend invocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttemptResult {
    pub success: bool,
    pub content: String,
    /// Length of `content` in characters.
    pub content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub service: String,
    pub url: String,
    pub response_time_ms: u64,
    pub stage: AttemptStage,
    pub attempted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AttemptError>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AttemptResult {
    /// Successful attempt carrying `content`.
    pub fn succeeded(service: &str, url: &str, content: String, response_time_ms: u64) -> Self {
        Self {
            success: true,
            content_length: content.chars().count(),
            content,
            title: None,
            service: service.to_string(),
            url: url.to_string(),
            response_time_ms,
            stage: AttemptStage::Primary,
            attempted_at: Utc::now(),
            error: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Failed attempt with a classified error.
    pub fn failed(service: &str, url: &str, code: ErrorCode, message: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            success: false,
            content: String::new(),
            content_length: 0,
            title: None,
            service: service.to_string(),
            url: url.to_string(),
            response_time_ms,
            stage: AttemptStage::Primary,
            attempted_at: Utc::now(),
            error: Some(AttemptError { code, message: message.into() }),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_stage(mut self, stage: AttemptStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Succeeded with at least one character of content.
    pub fn has_content(&self) -> bool {
        self.success && self.content_length > 0
    }
}

/// Result of validating and normalizing a candidate URL.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct UrlValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub original_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_url: Option<String>,
    pub has_fixes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why content was or was not judged meaningful.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentReason {
    MeaningfulContent,
    EmptyContent,
    UselessPatternDetected,
    ContentTooShort,
    InsufficientTextContent,
    RepetitiveContent,
}

/// Quality verdict for one piece of extracted content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ContentValidation {
    pub is_meaningful: bool,
    pub reason: ContentReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub content_length: usize,
    pub text_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diversity_ratio: Option<f64>,
    pub source: String,
}

/// Which signal produced a 404 verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Content,
    UrlPattern,
    None,
}

/// Suspected-404 verdict.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NotFoundDetection {
    pub is_404: bool,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub matched: Vec<String>,
}

impl NotFoundDetection {
    pub fn none() -> Self {
        Self { is_404: false, confidence: 0.0, method: DetectionMethod::None, matched: Vec::new() }
    }
}

/// Availability of one backend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServiceHealth {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Availability keyed by backend name.
pub type HealthReport = BTreeMap<String, ServiceHealth>;

/// How far down the fallback chain the winning content came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    Primary,
    Secondary,
    Tertiary,
    UltraResilient,
    Unknown,
}

/// Backend order chosen for one URL.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct StrategySummary {
    pub primary: String,
    pub fallback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_fallback: Option<String>,
    pub reason: String,
}

/// Top-level failure category of a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseErrorCode {
    InvalidUrl,
    AllServicesDown,
    AllAttemptsFailed,
}

/// Per-backend error breakdown entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServiceError {
    pub service: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Error details present whenever nothing usable came back.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ResponseError {
    pub code: ResponseErrorCode,
    pub message: String,
    pub service_errors: Vec<ServiceError>,
}

/// Final aggregate returned by one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionResponse {
    /// Winning attempt, or the last one tried when nothing won.
    pub result: AttemptResult,
    pub original_url: String,
    pub technical_success: bool,
    pub meaningful_success: bool,
    pub fallback_level: FallbackLevel,
    pub attempts: Vec<AttemptResult>,
    pub validation: UrlValidation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_validation: Option<ContentValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_found: Option<NotFoundDetection>,
    pub archive_attempted: bool,
    pub ultra_resilient_attempts: usize,
    pub has_any_successful_service: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    pub total_time_ms: u64,
}
