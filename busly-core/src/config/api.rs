//! Backend connection configuration.

use std::time::Duration;

/// Production backend.
pub const DEFAULT_BASE_URL: &str = "https://api.gobusly.com";

/// Per-request timeout unless a request overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "BUSLY_API_BASE_URL";

/// Environment variable overriding the timeout, in milliseconds.
pub const TIMEOUT_ENV: &str = "BUSLY_API_TIMEOUT_MS";

/// Where and how the API client talks to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto.
    pub base_url: String,
    /// Default request timeout.
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ApiConfig {
    /// Config pointing at `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Resolve from the environment, then the persisted settings, then defaults.
    pub fn resolve(settings: &super::Settings) -> Self {
        Self::resolve_with(|key| std::env::var(key).ok(), settings)
    }

    fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
        settings: &super::Settings,
    ) -> Self {
        let base_url = lookup(BASE_URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .or_else(|| settings.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = match lookup(TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    tracing::warn!(value = %raw, "Ignoring invalid {}", TIMEOUT_ENV);
                    DEFAULT_TIMEOUT
                }
            },
            None => DEFAULT_TIMEOUT,
        };

        Self { base_url, timeout }
    }

    /// Set the default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::resolve_with(env(&[]), &Settings::default());
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides_settings() {
        let settings = Settings {
            api_base_url: Some("https://from-settings".to_string()),
            ..Default::default()
        };

        let config = ApiConfig::resolve_with(
            env(&[(BASE_URL_ENV, "https://from-env"), (TIMEOUT_ENV, "2500")]),
            &settings,
        );
        assert_eq!(config.base_url, "https://from-env");
        assert_eq!(config.timeout, Duration::from_millis(2500));

        let config = ApiConfig::resolve_with(env(&[]), &settings);
        assert_eq!(config.base_url, "https://from-settings");
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config =
            ApiConfig::resolve_with(env(&[(TIMEOUT_ENV, "soon")]), &Settings::default());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let config = ApiConfig::resolve_with(env(&[(TIMEOUT_ENV, "0")]), &Settings::default());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
