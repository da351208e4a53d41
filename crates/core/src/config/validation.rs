//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Policy presets understood by the archive policy engine.
const KNOWN_POLICY_MODES: &[&str] = &["disabled", "conservative", "normal", "aggressive"];

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - any attempt timeout is below 100ms or above 5 minutes
    /// - the health probe timeout exceeds 60s
    /// - `batch_concurrency` is 0 or above 16
    /// - a base URL is not http(s)
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("timeout_ms", self.timeout_ms), ("ladder_timeout_ms", self.ladder_timeout_ms)] {
            if value < 100 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
            }
            if value > 300_000 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must not exceed 5 minutes (300000ms)".into(),
                });
            }
        }

        if self.health_timeout_ms < 100 || self.health_timeout_ms > 60_000 {
            return Err(ConfigError::Invalid {
                field: "health_timeout_ms".into(),
                reason: "must be between 100ms and 60000ms".into(),
            });
        }

        if self.batch_concurrency == 0 || self.batch_concurrency > 16 {
            return Err(ConfigError::Invalid {
                field: "batch_concurrency".into(),
                reason: "must be between 1 and 16".into(),
            });
        }

        for (field, value) in [
            ("tavily_base_url", &self.tavily_base_url),
            ("reader_base_url", &self.reader_base_url),
            ("wayback_api_url", &self.wayback_api_url),
            ("health_probe_url", &self.health_probe_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be an http(s) URL".into() });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !KNOWN_POLICY_MODES.contains(&self.policy_404_mode.to_lowercase().as_str()) {
            tracing::warn!(
                mode = %self.policy_404_mode,
                "unrecognized 404 policy mode; the normal preset will be used"
            );
        }

        if self.cache_services.is_empty() {
            tracing::warn!("no cache services configured; escalation ladder will skip cache lookups");
        }

        Ok(())
    }

    /// Require the primary backend key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_tavily_api_key(&self) -> Result<&str, ConfigError> {
        self.tavily_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "tavily_api_key".into(),
                hint: "Set TAVILY_API_KEY or RESILEX_TAVILY_API_KEY".into(),
            })
    }
}
