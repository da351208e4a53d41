//! Ultra-resilient escalation ladder.
//!
//! Runs after every standard attempt came back failed or empty and the archive
//! policy agreed. Tactics run in order and stop at the first accepted result:
//!
//! 1. **Alternate headers on the primary**: up to 2 browser profiles; skipped
//!    when the first standard failure was a credential problem.
//! 2. **Cache services**: each configured mirror through the free reader,
//!    capped by `max_archive_attempts`; accepted above 100 chars.
//! 3. **Reader URL shapes**: direct, single-wrapped, double-wrapped; accepted
//!    above 50 chars.
//! 4. **Connection workarounds**: only when the latest failure looks like a
//!    TLS/connection/timeout problem; free reader with the profiles step 1 did
//!    not use.
//!
//! Every attempt is returned, accepted or not, so the caller's log stays complete.

pub mod cache;
pub mod headers;

pub use cache::{CATALOG, CacheLookup, CacheService, LookupContext};
pub use headers::{HeaderProfile, PROFILES};

use std::time::Duration;

use resilex_core::{AttemptError, AttemptResult, AttemptStage, ErrorCode, ExtractionOptions, Policy404Config};

use crate::backends::{Backend, Backends};
use crate::policy::RandomSource;

/// Header profiles tried against the primary backend.
const PRIMARY_HEADER_RETRIES: usize = 2;

/// Cache-service content must be longer than this to count.
pub const CACHE_MIN_CHARS: usize = 100;

/// Alternate reader-shape content must be longer than this to count.
pub const SHAPE_MIN_CHARS: usize = 50;

/// Failure messages that suggest a transport-level workaround may help.
const TRANSPORT_HINTS: &[&str] =
    &["certificate", "ssl", "tls", "connection refused", "econnrefused", "timeout", "timed out"];

/// Which tactic produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tactic {
    AlternateHeaders,
    CacheService,
    ReaderShape,
    TransportWorkaround,
}

impl Tactic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tactic::AlternateHeaders => "alternate_headers",
            Tactic::CacheService => "cache_service",
            Tactic::ReaderShape => "reader_shape",
            Tactic::TransportWorkaround => "transport_workaround",
        }
    }
}

/// Reader URL variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderShape {
    Direct,
    SingleWrap,
    DoubleWrap,
}

impl ReaderShape {
    pub const ALL: [ReaderShape; 3] = [ReaderShape::Direct, ReaderShape::SingleWrap, ReaderShape::DoubleWrap];

    pub fn service_name(&self) -> &'static str {
        match self {
            ReaderShape::Direct => "jina_reader_direct",
            ReaderShape::SingleWrap => "jina_reader_wrapped",
            ReaderShape::DoubleWrap => "jina_reader_double_wrapped",
        }
    }

    /// Reader URL for `target`.
    pub fn build(&self, reader_base: &str, target: &str) -> String {
        match self {
            ReaderShape::Direct => format!("{reader_base}/{target}"),
            ReaderShape::SingleWrap => format!("{reader_base}/{reader_base}/{target}"),
            ReaderShape::DoubleWrap => format!("{reader_base}/{reader_base}/{reader_base}/{target}"),
        }
    }
}

/// Everything the ladder produced.
#[derive(Debug, Default)]
pub struct LadderRun {
    pub attempts: Vec<AttemptResult>,
}

/// Escalation ladder bound to one engine's backends and settings.
pub struct Ladder<'a> {
    pub backends: &'a Backends,
    pub cache_services: &'a [&'static CacheService],
    pub wayback_api: &'a str,
    pub timeout: Duration,
    pub rng: &'a dyn RandomSource,
}

impl Ladder<'_> {
    /// Run the tactics for `url`. `prior` is the standard attempt log.
    pub async fn run(
        &self, url: &str, options: &ExtractionOptions, policy: &Policy404Config, prior: &[AttemptResult],
    ) -> LadderRun {
        let mut run = LadderRun::default();
        let profiles = headers::rotated(self.rng);
        let mut sent_profiles = 0;

        let first_failure = prior.iter().find_map(|a| a.error_code());
        if first_failure.is_some_and(|code| code.is_auth()) {
            tracing::debug!(url, code = ?first_failure, "skipping header rotation on primary after auth failure");
        } else {
            tracing::info!(url, "escalation: alternate headers on primary");
            sent_profiles = PRIMARY_HEADER_RETRIES.min(profiles.len());
            for profile in &profiles[..sent_profiles] {
                let headers = profile.apply(&options.headers);
                let attempt = self
                    .backends
                    .extract(Backend::Tavily, url, options, &headers, self.timeout)
                    .await
                    .with_metadata("header_profile", profile.name.into());
                if self.push(&mut run, attempt, Tactic::AlternateHeaders, 0) {
                    return run;
                }
            }
        }

        let limit = policy.max_archive_attempts as usize;
        if limit > 0 && !self.cache_services.is_empty() {
            tracing::info!(url, limit, "escalation: cache services");
            let ctx = LookupContext { backends: self.backends, wayback_api: self.wayback_api, timeout: self.timeout };
            for service in self.cache_services.iter().take(limit) {
                let attempt = match service.resolve(&ctx, url).await {
                    Some(cache_url) => {
                        let reader_url = self.backends.reader_url(&cache_url);
                        self.backends
                            .fetch_reader_url(service.name, &reader_url, url, &options.headers, self.timeout)
                            .await
                            .with_metadata("cache_url", cache_url.into())
                    }
                    None => AttemptResult::failed(service.name, url, ErrorCode::NotFound, "no cached copy available", 0),
                };
                if self.push(&mut run, attempt, Tactic::CacheService, CACHE_MIN_CHARS) {
                    return run;
                }
            }
        }

        tracing::info!(url, "escalation: alternate reader URL shapes");
        for shape in ReaderShape::ALL {
            let reader_url = shape.build(self.backends.reader_base(), url);
            let attempt = self
                .backends
                .fetch_reader_url(shape.service_name(), &reader_url, url, &options.headers, self.timeout)
                .await;
            if self.push(&mut run, attempt, Tactic::ReaderShape, SHAPE_MIN_CHARS) {
                return run;
            }
        }

        let latest_failure = prior
            .iter()
            .chain(run.attempts.iter())
            .rev()
            .find_map(|a| a.error.as_ref())
            .map(|e| e.message.to_lowercase());
        let transport_problem = latest_failure.is_some_and(|msg| TRANSPORT_HINTS.iter().any(|h| msg.contains(h)));

        if transport_problem {
            tracing::info!(url, "escalation: transport workarounds");
            for profile in &profiles[sent_profiles..] {
                let headers = profile.apply(&options.headers);
                let attempt = self
                    .backends
                    .extract(Backend::JinaReader, url, options, &headers, self.timeout)
                    .await
                    .with_metadata("header_profile", profile.name.into());
                if self.push(&mut run, attempt, Tactic::TransportWorkaround, 0) {
                    return run;
                }
            }
        }

        tracing::info!(url, attempts = run.attempts.len(), "escalation ladder exhausted");
        run
    }

    /// Record `attempt`; true when it is accepted and the ladder should stop.
    fn push(&self, run: &mut LadderRun, attempt: AttemptResult, tactic: Tactic, min_chars: usize) -> bool {
        let attempt = accept_above(attempt, min_chars)
            .with_stage(AttemptStage::Escalation)
            .with_metadata("tactic", tactic.as_str().into());
        let accepted = attempt.has_content();
        run.attempts.push(attempt);
        accepted
    }
}

/// Downgrade a successful attempt whose content is not longer than `min_chars`.
///
/// The content is kept for diagnostics and 404 detection.
pub fn accept_above(mut attempt: AttemptResult, min_chars: usize) -> AttemptResult {
    if attempt.success && attempt.content_length <= min_chars {
        attempt.success = false;
        attempt.error = Some(AttemptError {
            code: ErrorCode::InvalidResponse,
            message: format!("content too short: {} chars, need more than {min_chars}", attempt.content_length),
        });
    }
    attempt
}
