//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (RESILEX_*)
//! 2. TOML config file (if RESILEX_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The two backend credentials and the 404 policy mode are also read from
//! their unprefixed names (`TAVILY_API_KEY`, `JINA_API_KEY`, `EXTRACT_404_MODE`)
//! when the prefixed form is absent.

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (RESILEX_*)
/// 2. TOML config file (if RESILEX_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Primary (paid) backend key.
    ///
    /// Set via RESILEX_TAVILY_API_KEY or TAVILY_API_KEY.
    #[serde(default)]
    pub tavily_api_key: Option<String>,

    /// Authenticated reader key.
    ///
    /// Set via RESILEX_JINA_API_KEY or JINA_API_KEY.
    #[serde(default)]
    pub jina_api_key: Option<String>,

    /// 404/archive policy preset: disabled | conservative | normal | aggressive.
    ///
    /// Set via RESILEX_POLICY_404_MODE or EXTRACT_404_MODE.
    #[serde(default = "default_policy_mode")]
    pub policy_404_mode: String,

    /// Base URL of the primary extraction API.
    #[serde(default = "default_tavily_base_url")]
    pub tavily_base_url: String,

    /// Base URL of the reader proxy (free and authenticated).
    #[serde(default = "default_reader_base_url")]
    pub reader_base_url: String,

    /// Base URL of the archive availability API.
    #[serde(default = "default_wayback_api_url")]
    pub wayback_api_url: String,

    /// Known-good page used by the reader health probes.
    #[serde(default = "default_health_probe_url")]
    pub health_probe_url: String,

    /// User-Agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for standard backend attempts in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for each escalation-ladder attempt in milliseconds.
    #[serde(default = "default_ladder_timeout_ms")]
    pub ladder_timeout_ms: u64,

    /// Timeout for each health probe in milliseconds.
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// Default batch chunk size.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Pause between batch chunks in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Cache services tried by the escalation ladder, in priority order.
    #[serde(default = "default_cache_services")]
    pub cache_services: Vec<String>,
}

fn default_policy_mode() -> String {
    "normal".into()
}

fn default_tavily_base_url() -> String {
    "https://api.tavily.com".into()
}

fn default_reader_base_url() -> String {
    "https://r.jina.ai".into()
}

fn default_wayback_api_url() -> String {
    "https://archive.org".into()
}

fn default_health_probe_url() -> String {
    "https://www.wikipedia.org/".into()
}

fn default_user_agent() -> String {
    "resilex/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_ladder_timeout_ms() -> u64 {
    15_000
}

fn default_health_timeout_ms() -> u64 {
    5_000
}

fn default_batch_concurrency() -> usize {
    3
}

fn default_batch_delay_ms() -> u64 {
    1_000
}

fn default_cache_services() -> Vec<String> {
    ["google_cache", "wayback_available", "archive_today", "wayback_direct", "bing_cache"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            jina_api_key: None,
            policy_404_mode: default_policy_mode(),
            tavily_base_url: default_tavily_base_url(),
            reader_base_url: default_reader_base_url(),
            wayback_api_url: default_wayback_api_url(),
            health_probe_url: default_health_probe_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            ladder_timeout_ms: default_ladder_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
            batch_concurrency: default_batch_concurrency(),
            batch_delay_ms: default_batch_delay_ms(),
            cache_services: default_cache_services(),
        }
    }
}

impl AppConfig {
    /// Standard attempt timeout as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Escalation-ladder attempt timeout as Duration.
    pub fn ladder_timeout(&self) -> Duration {
        Duration::from_millis(self.ladder_timeout_ms)
    }

    /// Health probe timeout as Duration.
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    /// Inter-chunk batch delay as Duration.
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `RESILEX_`
    /// 2. TOML file from `RESILEX_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// Unprefixed credential and mode variables fill whatever is still unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("RESILEX_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("RESILEX_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.tavily_api_key = non_empty(config.tavily_api_key).or_else(|| env_non_empty("TAVILY_API_KEY"));
        config.jina_api_key = non_empty(config.jina_api_key).or_else(|| env_non_empty("JINA_API_KEY"));
        if std::env::var("RESILEX_POLICY_404_MODE").is_err()
            && let Some(mode) = env_non_empty("EXTRACT_404_MODE")
        {
            config.policy_404_mode = mode;
        }

        if config.tavily_api_key.is_none() {
            tracing::warn!("no primary API key configured; primary backend attempts will fail fast");
        }
        if config.jina_api_key.is_none() {
            tracing::info!("no reader API key configured; authenticated reader disabled");
        }

        config.validate()?;

        Ok(config)
    }

    /// Whether the authenticated reader can be used.
    pub fn has_jina_key(&self) -> bool {
        self.jina_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Whether the primary backend has a credential.
    pub fn has_tavily_key(&self) -> bool {
        self.tavily_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_non_empty(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.tavily_api_key.is_none());
        assert!(config.jina_api_key.is_none());
        assert_eq!(config.policy_404_mode, "normal");
        assert_eq!(config.reader_base_url, "https://r.jina.ai");
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.health_timeout_ms, 5_000);
        assert_eq!(config.batch_concurrency, 3);
        assert_eq!(config.batch_delay_ms, 1_000);
        assert_eq!(config.cache_services.len(), 5);
        assert_eq!(config.cache_services[0], "google_cache");
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
        assert_eq!(config.ladder_timeout(), Duration::from_millis(15_000));
        assert_eq!(config.health_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.batch_delay(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_key_presence() {
        let config = AppConfig { jina_api_key: Some(String::new()), ..Default::default() };
        assert!(!config.has_jina_key());

        let config = AppConfig { jina_api_key: Some("jina_abc".into()), ..Default::default() };
        assert!(config.has_jina_key());
        assert!(!config.has_tavily_key());
    }

    #[test]
    fn test_load_prefixed_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RESILEX_TAVILY_API_KEY", "tvly-test");
            jail.set_env("RESILEX_POLICY_404_MODE", "aggressive");
            jail.set_env("RESILEX_BATCH_CONCURRENCY", "5");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.tavily_api_key.as_deref(), Some("tvly-test"));
            assert_eq!(config.policy_404_mode, "aggressive");
            assert_eq!(config.batch_concurrency, 5);
            Ok(())
        });
    }

    #[test]
    fn test_load_bare_credential_fallback() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("JINA_API_KEY", "jina-bare");
            jail.set_env("EXTRACT_404_MODE", "conservative");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.jina_api_key.as_deref(), Some("jina-bare"));
            assert_eq!(config.policy_404_mode, "conservative");
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "resilex.toml",
                r#"
                    timeout_ms = 12000
                    cache_services = ["wayback_direct"]
                "#,
            )?;
            jail.set_env("RESILEX_CONFIG_FILE", "resilex.toml");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.timeout_ms, 12_000);
            assert_eq!(config.cache_services, vec!["wayback_direct".to_string()]);
            Ok(())
        });
    }
}
