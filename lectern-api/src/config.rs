//! Service Configuration
//!
//! Everything the server needs is read from `LECTERN_*` environment
//! variables once at startup and passed down explicitly. The lookup is
//! injectable so tests never touch the process environment.

use std::time::Duration;

use lectern_core::{DatastorePolicy, LecternConfig};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP-level settings: CORS and request admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Allowed CORS origins. Empty means allow all (dev mode).
    pub cors_origins: Vec<String>,

    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Requests handled at once; further requests wait.
    pub max_concurrent_requests: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            max_concurrent_requests: 256,
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `LECTERN_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `LECTERN_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `LECTERN_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    /// - `LECTERN_MAX_CONCURRENT_REQUESTS`: (default: 256)
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cors_origins: lookup("LECTERN_CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            cors_allow_credentials: lookup("LECTERN_CORS_ALLOW_CREDENTIALS")
                .map(|s| s.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.cors_allow_credentials),
            cors_max_age_secs: parsed(&lookup, "LECTERN_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            max_concurrent_requests: parsed(&lookup, "LECTERN_MAX_CONCURRENT_REQUESTS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_requests),
        }
    }

    /// Strict CORS once any origin is configured.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|allowed| allowed == origin)
    }
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Query-layer configuration plus HTTP settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    pub lectern: LecternConfig,
    pub api: ApiConfig,
}

impl ServiceConfig {
    /// Environment variables (all optional):
    /// - `LECTERN_CACHE_CAPACITY`
    /// - `LECTERN_HISTORY_DEFAULT_LIMIT`, `LECTERN_HISTORY_MAX_LIMIT`
    /// - `LECTERN_DEFAULT_MODEL`, `LECTERN_RECOMMEND_ATTEMPTS`,
    ///   `LECTERN_RECOMMEND_TIMEOUT_SECS`, `LECTERN_RECOMMEND_HISTORY_WINDOW`,
    ///   `LECTERN_RECOMMEND_DEFAULT_COUNT`, `LECTERN_RECOMMEND_MAX_COUNT`
    /// - `LECTERN_OLLAMA_URL`, `LECTERN_OLLAMA_MODEL`
    /// - `LECTERN_GEMINI_URL`, `LECTERN_GEMINI_MODEL`, `LECTERN_GEMINI_API_KEY`
    ///   (falls back to `GEMINI_API_KEY`)
    /// - `LECTERN_DATASTORE_POLICY`: `degrade` (default) or `surface`
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let mut lectern = LecternConfig::default();

        if let Some(capacity) = number(&lookup, "LECTERN_CACHE_CAPACITY")? {
            lectern.cache.capacity = capacity;
        }

        if let Some(limit) = number(&lookup, "LECTERN_HISTORY_DEFAULT_LIMIT")? {
            lectern.history.default_limit = limit;
        }
        if let Some(limit) = number(&lookup, "LECTERN_HISTORY_MAX_LIMIT")? {
            lectern.history.max_limit = limit;
        }

        let rec = &mut lectern.recommendation;
        if let Some(model) = text(&lookup, "LECTERN_DEFAULT_MODEL") {
            rec.default_model = model;
        }
        if let Some(attempts) = number(&lookup, "LECTERN_RECOMMEND_ATTEMPTS")? {
            rec.attempts = attempts;
        }
        if let Some(secs) = number(&lookup, "LECTERN_RECOMMEND_TIMEOUT_SECS")? {
            rec.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(window) = number(&lookup, "LECTERN_RECOMMEND_HISTORY_WINDOW")? {
            rec.history_window = window;
        }
        if let Some(count) = number(&lookup, "LECTERN_RECOMMEND_DEFAULT_COUNT")? {
            rec.default_count = count;
        }
        if let Some(count) = number(&lookup, "LECTERN_RECOMMEND_MAX_COUNT")? {
            rec.max_count = count;
        }

        if let Some(url) = text(&lookup, "LECTERN_OLLAMA_URL") {
            lectern.ollama.base_url = url;
        }
        if let Some(model) = text(&lookup, "LECTERN_OLLAMA_MODEL") {
            lectern.ollama.model = model;
        }

        if let Some(url) = text(&lookup, "LECTERN_GEMINI_URL") {
            lectern.gemini.base_url = url;
        }
        if let Some(model) = text(&lookup, "LECTERN_GEMINI_MODEL") {
            lectern.gemini.model = model;
        }
        lectern.gemini.api_key =
            text(&lookup, "LECTERN_GEMINI_API_KEY").or_else(|| text(&lookup, "GEMINI_API_KEY"));

        if let Some(policy) = text(&lookup, "LECTERN_DATASTORE_POLICY") {
            lectern.datastore_policy = policy.parse::<DatastorePolicy>().map_err(ApiError::from)?;
        }

        lectern.validate()?;

        Ok(Self {
            lectern,
            api: ApiConfig::from_lookup(lookup),
        })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Process environment as a lookup function.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

/// Non-blank value.
fn text(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lenient parse, used where a bad value should fall back to the default.
fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    text(lookup, key).and_then(|v| v.parse().ok())
}

/// Strict parse: a present but unparseable value is an error.
fn number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> ApiResult<Option<T>> {
    match text(lookup, key) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            ApiError::invalid_input(format!("{} must be a number, got '{}'", key, value))
                .with_details(serde_json::json!({ "variable": key, "value": value }))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() -> ApiResult<()> {
        let config = ServiceConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.lectern.cache.capacity, 100);
        assert_eq!(config.lectern.recommendation.attempts, 2);
        assert!(config.lectern.gemini.api_key.is_none());
        Ok(())
    }

    #[test]
    fn test_overrides() -> ApiResult<()> {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("LECTERN_CACHE_CAPACITY", "8"),
            ("LECTERN_HISTORY_MAX_LIMIT", "50"),
            ("LECTERN_DEFAULT_MODEL", "gemini"),
            ("LECTERN_RECOMMEND_TIMEOUT_SECS", "5"),
            ("LECTERN_OLLAMA_URL", "http://ollama:11434"),
            ("GEMINI_API_KEY", "k"),
            ("LECTERN_DATASTORE_POLICY", "Surface"),
            ("LECTERN_CORS_ORIGINS", "https://a.example, ,https://b.example"),
        ]))?;
        assert_eq!(config.lectern.cache.capacity, 8);
        assert_eq!(config.lectern.history.max_limit, 50);
        assert_eq!(config.lectern.recommendation.default_model, "gemini");
        assert_eq!(
            config.lectern.recommendation.attempt_timeout,
            Duration::from_secs(5)
        );
        assert_eq!(config.lectern.ollama.base_url, "http://ollama:11434");
        assert_eq!(config.lectern.gemini.api_key.as_deref(), Some("k"));
        assert_eq!(config.lectern.datastore_policy, DatastorePolicy::Surface);
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_prefixed_gemini_key_wins() -> ApiResult<()> {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("LECTERN_GEMINI_API_KEY", "primary"),
            ("GEMINI_API_KEY", "fallback"),
        ]))?;
        assert_eq!(config.lectern.gemini.api_key.as_deref(), Some("primary"));
        Ok(())
    }

    #[test]
    fn test_unparseable_number_is_rejected() {
        let result = ServiceConfig::from_lookup(lookup(&[("LECTERN_CACHE_CAPACITY", "lots")]));
        let err = result.err().map(|e| e.code);
        assert_eq!(err, Some(crate::error::ErrorCode::InvalidInput));
    }

    #[test]
    fn test_zero_capacity_fails_validation() {
        assert!(ServiceConfig::from_lookup(lookup(&[("LECTERN_CACHE_CAPACITY", "0")])).is_err());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        assert!(
            ServiceConfig::from_lookup(lookup(&[("LECTERN_DATASTORE_POLICY", "ignore")])).is_err()
        );
    }

    #[test]
    fn test_origin_allowed() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());
        assert!(config.is_origin_allowed("https://anything.example"));

        config.cors_origins = vec!["https://lib.example".to_string()];
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://lib.example"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }

    #[test]
    fn test_bad_concurrency_falls_back() {
        let config = ApiConfig::from_lookup(lookup(&[("LECTERN_MAX_CONCURRENT_REQUESTS", "0")]));
        assert_eq!(config.max_concurrent_requests, 256);
    }
}
