//! Backend health probing.
//!
//! Three independent probes run concurrently, each bounded by its own timeout
//! so a hung backend cannot stall the others.

use std::time::Duration;

use resilex_core::{HealthReport, ServiceHealth};

use crate::backends::{Backend, BackendError, Backends, reader, tavily};

/// Probes every backend against a known-good page.
#[derive(Debug, Clone)]
pub struct HealthProber {
    backends: Backends,
    probe_url: String,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(backends: Backends, probe_url: impl Into<String>, timeout: Duration) -> Self {
        Self { backends, probe_url: probe_url.into(), timeout }
    }

    /// Availability of each backend keyed by name.
    pub async fn probe(&self) -> HealthReport {
        let (primary, free, auth) = tokio::join!(self.probe_tavily(), self.probe_reader(), self.probe_auth_reader());

        let report: HealthReport = [
            (Backend::Tavily.name().to_string(), primary),
            (Backend::JinaReader.name().to_string(), free),
            (Backend::JinaAuth.name().to_string(), auth),
        ]
        .into_iter()
        .collect();

        tracing::debug!(?report, "health probe complete");
        report
    }

    async fn probe_tavily(&self) -> ServiceHealth {
        let Some(key) = self.backends.tavily_key() else {
            return unavailable("API key not configured");
        };

        let outcome = self.bounded(tavily::probe(&self.backends, key, &self.probe_url, self.timeout)).await;
        match outcome {
            Ok(()) => available(),
            Err(BackendError::Http { status: 401 | 403, .. }) => unavailable("invalid API key"),
            Err(BackendError::Http { status, .. }) if status >= 500 => unavailable(format!("HTTP {status}")),
            // Reachable and the key was accepted; a 4xx here is about the probe request itself.
            Err(BackendError::Http { .. }) => available(),
            Err(err) => unavailable(err.to_string()),
        }
    }

    async fn probe_reader(&self) -> ServiceHealth {
        match self.bounded(reader::probe(&self.backends, None, &self.probe_url, self.timeout)).await {
            Ok(()) => available(),
            Err(err) => unavailable(err.to_string()),
        }
    }

    async fn probe_auth_reader(&self) -> ServiceHealth {
        let Some(key) = self.backends.jina_key() else {
            return unavailable("not configured");
        };

        match self.bounded(reader::probe(&self.backends, Some(key), &self.probe_url, self.timeout)).await {
            Ok(()) => available(),
            Err(BackendError::Http { status: 401 | 403, .. }) => unavailable("invalid API key"),
            Err(err) => unavailable(err.to_string()),
        }
    }

    /// Hard wall-clock bound on top of the request timeout (covers DNS and connect).
    async fn bounded<F>(&self, probe: F) -> Result<(), BackendError>
    where
        F: std::future::Future<Output = Result<(), BackendError>>,
    {
        tokio::time::timeout(self.timeout, probe)
            .await
            .unwrap_or(Err(BackendError::Timeout))
    }
}

/// Every backend reported unavailable.
pub fn all_down(report: &HealthReport) -> bool {
    !report.is_empty() && report.values().all(|h| !h.available)
}

fn available() -> ServiceHealth {
    ServiceHealth { available: true, error: None }
}

fn unavailable(reason: impl Into<String>) -> ServiceHealth {
    ServiceHealth { available: false, error: Some(reason.into()) }
}
