//! Extraction orchestrator.
//!
//! One call walks a fixed sequence of stages, with early exits after
//! validation and health checking:
//!
//! ```text
//! Validating -> HealthChecking -> PrimaryAttempt -> FallbackAttempt
//!            -> FinalFallback -> Escalation -> Classifying -> Done
//! ```
//!
//! Attempts are strictly sequential; each stage depends on the previous
//! outcome. Expected failures never surface as `Err`: they are recorded in
//! the attempt log and summarized on the response.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use resilex_core::{
    AppConfig, AttemptResult, AttemptStage, Error, ErrorCode, ExtractionOptions, ExtractionResponse, FallbackLevel,
    HealthReport, ResponseError, ResponseErrorCode, ServiceError, StrategySummary, UrlValidation,
};

use crate::backends::{Backend, Backends, CostTier};
use crate::health::{self, HealthProber};
use crate::ladder::{self, CacheService, Ladder};
use crate::policy::{self, RandomSource, ThreadRandom};
use crate::quality;
use crate::validate::{Resolver, SystemResolver, UrlValidator};

/// Attempt count above which a result is reported as ultra-resilient.
const STANDARD_ATTEMPT_CEILING: usize = 4;

/// Host/path words that mark documentation pages.
const DOC_KEYWORDS: &[&str] = &[
    "docs",
    "doc",
    "documentation",
    "reference",
    "api",
    "guide",
    "guides",
    "manual",
    "tutorial",
    "handbook",
    "readthedocs",
    "wiki",
    "learn",
    "developer",
    "developers",
    "sdk",
];

/// Backend order for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub primary: Backend,
    pub fallback: Backend,
    /// Credentialed backend not already tried, if any.
    pub final_fallback: Option<Backend>,
    pub reason: &'static str,
}

impl Strategy {
    pub fn summary(&self) -> StrategySummary {
        StrategySummary {
            primary: self.primary.name().to_string(),
            fallback: self.fallback.name().to_string(),
            final_fallback: self.final_fallback.map(|b| b.name().to_string()),
            reason: self.reason.to_string(),
        }
    }
}

/// Whether `url` looks like a documentation page.
pub fn is_documentation_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = parsed.path().to_ascii_lowercase();

    host.split('.')
        .chain(path.split(|c: char| !c.is_ascii_alphanumeric()))
        .any(|token| DOC_KEYWORDS.contains(&token))
}

/// Backend with the best historical success rate; lower latency breaks ties.
fn most_reliable(candidates: impl Iterator<Item = Backend>) -> Option<Backend> {
    candidates.max_by(|a, b| {
        let (a, b) = (a.descriptor(), b.descriptor());
        a.success_rate
            .total_cmp(&b.success_rate)
            .then(b.avg_latency_ms.cmp(&a.avg_latency_ms))
    })
}

/// Pick the backend order from the static descriptors. Pure.
///
/// The most reliable backend goes first. The fallback is the most reliable
/// metered backend when cost tracking is requested and a key exists, otherwise
/// the most reliable free one. The final fallback is the remaining
/// credentialed backend when a key exists and cost tracking is off.
pub fn select_strategy(url: &str, options: &ExtractionOptions, has_auth_key: bool) -> Strategy {
    let primary = most_reliable(Backend::ALL.into_iter()).unwrap_or(Backend::Tavily);
    let others = || Backend::ALL.into_iter().filter(move |b| *b != primary);

    if options.wants_cost_tracking() && has_auth_key {
        let metered = most_reliable(others().filter(|b| b.descriptor().cost == CostTier::Metered));
        if let Some(fallback) = metered {
            return Strategy { primary, fallback, final_fallback: None, reason: "cost_tracking" };
        }
    }

    let fallback = most_reliable(others().filter(|b| b.descriptor().cost == CostTier::Free)).unwrap_or(Backend::JinaReader);
    let final_fallback = if has_auth_key {
        most_reliable(others().filter(|b| *b != fallback && b.descriptor().requires_auth))
    } else {
        None
    };
    let documentation = is_documentation_url(url) && fallback.descriptor().best_for.contains(&"documentation");
    let reason = if documentation { "documentation_url" } else { "default" };

    Strategy { primary, fallback, final_fallback, reason }
}

/// Whether the primary outcome calls for the fallback backend.
pub fn needs_fallback(primary: &AttemptResult, options: &ExtractionOptions) -> bool {
    let escalating_code = matches!(
        primary.error_code(),
        Some(
            ErrorCode::Unauthorized
                | ErrorCode::Forbidden403
                | ErrorCode::Forbidden
                | ErrorCode::RateLimited
                | ErrorCode::Exception
        )
    );

    !primary.success
        || escalating_code
        || (primary.content_length == 0 && !options.skip_empty_fallback)
        || (options.wants_cost_tracking() && !primary.success)
}

/// Index of the first usable attempt.
pub fn find_winner(log: &[AttemptResult], cost_tracking: bool) -> Option<usize> {
    log.iter().position(|a| a.success && (a.content_length > 0 || cost_tracking))
}

/// Level reported for `winner` given the whole log.
pub fn fallback_level(winner: Option<&AttemptResult>, total_attempts: usize) -> FallbackLevel {
    let Some(winner) = winner else {
        return FallbackLevel::Unknown;
    };
    if total_attempts > STANDARD_ATTEMPT_CEILING {
        return FallbackLevel::UltraResilient;
    }
    match winner.stage {
        AttemptStage::Primary => FallbackLevel::Primary,
        AttemptStage::Fallback => FallbackLevel::Secondary,
        AttemptStage::FinalFallback => FallbackLevel::Tertiary,
        AttemptStage::Escalation => FallbackLevel::UltraResilient,
    }
}

/// Resilient extraction engine. Cheap to share behind an `Arc`.
pub struct Engine {
    config: AppConfig,
    backends: Backends,
    validator: UrlValidator,
    prober: HealthProber,
    cache_services: Vec<&'static CacheService>,
    rng: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backends", &self.backends)
            .field("cache_services", &self.cache_services.iter().map(|s| s.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine using system DNS and thread-local randomness.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        config.validate()?;
        let backends = Backends::new(config)?;
        let prober = HealthProber::new(backends.clone(), config.health_probe_url.clone(), config.health_timeout());

        let mut validator = UrlValidator::new(Arc::new(SystemResolver));
        if let Some(host) = reader_host(&config.reader_base_url) {
            validator = validator.with_reader_host(host);
        }

        Ok(Self {
            config: config.clone(),
            backends,
            validator,
            prober,
            cache_services: ladder::cache::select(&config.cache_services),
            rng: Arc::new(ThreadRandom),
        })
    }

    /// Replace the DNS resolver used for SSRF checks.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        let mut validator = UrlValidator::new(resolver);
        if let Some(host) = reader_host(&self.config.reader_base_url) {
            validator = validator.with_reader_host(host);
        }
        self.validator = validator;
        self
    }

    /// Replace the random source used for policy draws and header rotation.
    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Extract readable content from `url`.
    pub async fn extract_content(&self, url: &str, options: &ExtractionOptions) -> ExtractionResponse {
        let start = Instant::now();
        tracing::info!(url, "extraction started");

        let validation = self.validator.validate(url).await;
        if !validation.valid {
            tracing::info!(url, issues = ?validation.issues, "URL rejected");
            return invalid_url_response(url, validation, start);
        }
        let target = validation.normalized_url.clone().unwrap_or_else(|| url.to_string());

        let health = if options.perform_health_check {
            let report = self.prober.probe().await;
            if health::all_down(&report) {
                tracing::warn!(url = %target, "all backends unavailable");
                return all_down_response(url, &target, validation, report, start);
            }
            Some(report)
        } else {
            None
        };

        let strategy = select_strategy(&target, options, self.backends.is_configured(Backend::JinaAuth));
        let cost_tracking = options.wants_cost_tracking();
        let timeout = options.timeout_ms.map(Duration::from_millis).unwrap_or_else(|| self.config.timeout());
        tracing::debug!(url = %target, ?strategy, "strategy selected");

        let mut log: Vec<AttemptResult> = Vec::new();

        let primary = self.attempt(strategy.primary, &target, options, timeout, AttemptStage::Primary).await;
        let escalate = needs_fallback(&primary, options);
        log.push(primary);

        if escalate {
            tracing::info!(url = %target, backend = %strategy.fallback, "falling back");
            let fallback = self.attempt(strategy.fallback, &target, options, timeout, AttemptStage::Fallback).await;
            let still_empty = !fallback.has_content();
            log.push(fallback);

            if let Some(last_resort) = strategy.final_fallback
                && still_empty
                && !cost_tracking
            {
                tracing::info!(url = %target, backend = %last_resort, "final fallback");
                let attempt = self.attempt(last_resort, &target, options, timeout, AttemptStage::FinalFallback).await;
                log.push(attempt);
            }
        }

        let standard_attempts = log.len();
        let mut not_found = None;
        let mut archive_attempted = false;

        if find_winner(&log, cost_tracking).is_none() {
            let detection = policy::detect(&target, &log);
            let policy = policy::policy_for(&self.config.policy_404_mode, options);

            if policy::should_try_archives(&target, &detection, &policy, self.rng.as_ref()) {
                archive_attempted = true;
                let ladder = Ladder {
                    backends: &self.backends,
                    cache_services: &self.cache_services,
                    wayback_api: &self.config.wayback_api_url,
                    timeout: self.config.ladder_timeout(),
                    rng: self.rng.as_ref(),
                };
                match AssertUnwindSafe(ladder.run(&target, options, &policy, &log)).catch_unwind().await {
                    Ok(run) => log.extend(run.attempts),
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::error!(url = %target, %message, "escalation ladder panicked");
                        log.push(
                            AttemptResult::failed("escalation", &target, ErrorCode::Exception, message, 0)
                                .with_stage(AttemptStage::Escalation),
                        );
                    }
                }
            } else {
                tracing::info!(url = %target, "escalation skipped by archive policy");
            }
            not_found = Some(detection);
        }

        let winner = find_winner(&log, cost_tracking);
        let response = assemble(AssembleInput {
            original_url: url,
            target: &target,
            validation,
            health,
            strategy: &strategy,
            log,
            winner,
            standard_attempts,
            not_found,
            archive_attempted,
            start,
        });

        tracing::info!(
            url = %target,
            technical_success = response.technical_success,
            meaningful_success = response.meaningful_success,
            level = ?response.fallback_level,
            attempts = response.attempts.len(),
            total_time_ms = response.total_time_ms,
            "extraction finished"
        );
        response
    }

    /// One backend call; a panic becomes an `EXCEPTION` attempt.
    async fn attempt(
        &self, backend: Backend, url: &str, options: &ExtractionOptions, timeout: Duration, stage: AttemptStage,
    ) -> AttemptResult {
        let started = Instant::now();
        let call = self.backends.extract(backend, url, options, &options.headers, timeout);

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(attempt) => attempt.with_stage(stage),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(backend = %backend, url, %message, "backend panicked");
                AttemptResult::failed(
                    backend.name(),
                    url,
                    ErrorCode::Exception,
                    format!("backend panicked: {message}"),
                    started.elapsed().as_millis() as u64,
                )
                .with_stage(stage)
            }
        }
    }
}

fn reader_host(reader_base: &str) -> Option<String> {
    url::Url::parse(reader_base).ok().and_then(|u| u.host_str().map(str::to_string))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct AssembleInput<'a> {
    original_url: &'a str,
    target: &'a str,
    validation: UrlValidation,
    health: Option<HealthReport>,
    strategy: &'a Strategy,
    log: Vec<AttemptResult>,
    winner: Option<usize>,
    standard_attempts: usize,
    not_found: Option<resilex_core::NotFoundDetection>,
    archive_attempted: bool,
    start: Instant,
}

fn assemble(input: AssembleInput<'_>) -> ExtractionResponse {
    let AssembleInput {
        original_url,
        target,
        validation,
        health,
        strategy,
        log,
        winner,
        standard_attempts,
        not_found,
        archive_attempted,
        start,
    } = input;

    let winning = winner.map(|i| &log[i]);
    let result = winning
        .or_else(|| log.last())
        .cloned()
        .unwrap_or_else(|| placeholder(target, ErrorCode::Unknown, "no attempt was made"));

    let technical_success = winning.is_some_and(|w| w.success && w.content_length > 0);
    let content_validation = quality::classify(&result.content, &result.service);
    let meaningful_success = technical_success && content_validation.is_meaningful;
    let fallback_level = fallback_level(winning, log.len());
    let has_any_successful_service = log.iter().any(|a| a.success);

    let error = (!has_any_successful_service).then(|| ResponseError {
        code: ResponseErrorCode::AllAttemptsFailed,
        message: format!("all {} extraction attempts failed", log.len()),
        service_errors: log
            .iter()
            .filter_map(|a| {
                a.error.as_ref().map(|e| ServiceError {
                    service: a.service.clone(),
                    code: e.code,
                    message: e.message.clone(),
                })
            })
            .collect(),
    });

    ExtractionResponse {
        result,
        original_url: original_url.to_string(),
        technical_success,
        meaningful_success,
        fallback_level,
        ultra_resilient_attempts: log.len().saturating_sub(standard_attempts),
        attempts: log,
        validation,
        health,
        strategy: Some(strategy.summary()),
        content_validation: Some(content_validation),
        not_found,
        archive_attempted,
        has_any_successful_service,
        error,
        total_time_ms: start.elapsed().as_millis() as u64,
    }
}

/// Stand-in result when no backend was called.
fn placeholder(url: &str, code: ErrorCode, message: &str) -> AttemptResult {
    AttemptResult::failed("none", url, code, message, 0)
}

fn early_exit(
    original_url: &str, result: AttemptResult, validation: UrlValidation, health: Option<HealthReport>,
    error: ResponseError, start: Instant,
) -> ExtractionResponse {
    ExtractionResponse {
        result,
        original_url: original_url.to_string(),
        technical_success: false,
        meaningful_success: false,
        fallback_level: FallbackLevel::Unknown,
        attempts: Vec::new(),
        validation,
        health,
        strategy: None,
        content_validation: None,
        not_found: None,
        archive_attempted: false,
        ultra_resilient_attempts: 0,
        has_any_successful_service: false,
        error: Some(error),
        total_time_ms: start.elapsed().as_millis() as u64,
    }
}

fn invalid_url_response(url: &str, validation: UrlValidation, start: Instant) -> ExtractionResponse {
    let message = validation.error.clone().unwrap_or_else(|| "invalid URL".to_string());
    let error = ResponseError { code: ResponseErrorCode::InvalidUrl, message: message.clone(), service_errors: Vec::new() };
    early_exit(url, placeholder(url, ErrorCode::BadRequest, &message), validation, None, error, start)
}

fn all_down_response(
    url: &str, target: &str, validation: UrlValidation, report: HealthReport, start: Instant,
) -> ExtractionResponse {
    let service_errors = report
        .iter()
        .map(|(service, health)| ServiceError {
            service: service.clone(),
            code: ErrorCode::Unknown,
            message: health.error.clone().unwrap_or_else(|| "unavailable".to_string()),
        })
        .collect();
    let error = ResponseError {
        code: ResponseErrorCode::AllServicesDown,
        message: "all extraction backends are unavailable".to_string(),
        service_errors,
    };
    let result = placeholder(target, ErrorCode::Unknown, "all extraction backends are unavailable");
    early_exit(url, result, validation, Some(report), error, start)
}
