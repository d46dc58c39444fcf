//! Configuration types
//!
//! One explicit configuration object is built at startup and handed to the
//! constructors that need it. Nothing here reads the environment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, LecternError, LecternResult};

/// How the datastore gateway reports query failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastorePolicy {
    /// Log the failure and return an empty/absent/`false` result.
    #[default]
    Degrade,
    /// Return the failure to the caller as a storage error.
    Surface,
}

impl FromStr for DatastorePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "degrade" => Ok(DatastorePolicy::Degrade),
            "surface" | "strict" => Ok(DatastorePolicy::Surface),
            other => Err(ConfigError::InvalidValue {
                field: "datastore_policy".to_string(),
                value: other.to_string(),
                reason: "expected 'degrade' or 'surface'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of composite results held at once.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySettings {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationSettings {
    /// Model tag used when the caller names none.
    pub default_model: String,
    /// Sequential attempts per request.
    pub attempts: u32,
    pub attempt_timeout: Duration,
    /// Recent borrow records used to seed the prompt.
    pub history_window: i64,
    pub default_count: u32,
    pub max_count: u32,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            default_model: "ollama".to_string(),
            attempts: 2,
            attempt_timeout: Duration::from_secs(60),
            history_window: 10,
            default_count: 5,
            max_count: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen3:1.7b".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct GeminiSettings {
    pub base_url: String,
    pub model: String,
    /// Without a key the Gemini recommender is left unregistered.
    pub api_key: Option<String>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LecternConfig {
    pub cache: CacheSettings,
    pub history: HistorySettings,
    pub recommendation: RecommendationSettings,
    pub ollama: OllamaSettings,
    pub gemini: GeminiSettings,
    pub datastore_policy: DatastorePolicy,
}

impl LecternConfig {
    pub fn validate(&self) -> LecternResult<()> {
        if self.cache.capacity == 0 {
            return Err(invalid("cache.capacity", "0", "capacity must be at least 1"));
        }

        if self.history.default_limit < 1 {
            return Err(invalid(
                "history.default_limit",
                &self.history.default_limit.to_string(),
                "default_limit must be at least 1",
            ));
        }

        if self.history.default_limit > self.history.max_limit {
            return Err(invalid(
                "history.default_limit",
                &self.history.default_limit.to_string(),
                "default_limit must not exceed max_limit",
            ));
        }

        let rec = &self.recommendation;
        if rec.attempts == 0 {
            return Err(invalid("recommendation.attempts", "0", "at least one attempt is required"));
        }

        if rec.attempt_timeout.is_zero() {
            return Err(invalid(
                "recommendation.attempt_timeout",
                &format!("{:?}", rec.attempt_timeout),
                "attempt_timeout must be positive",
            ));
        }

        if rec.history_window < 0 {
            return Err(invalid(
                "recommendation.history_window",
                &rec.history_window.to_string(),
                "history_window must be non-negative",
            ));
        }

        if rec.default_count == 0 || rec.default_count > rec.max_count {
            return Err(invalid(
                "recommendation.default_count",
                &rec.default_count.to_string(),
                "default_count must be between 1 and max_count",
            ));
        }

        if rec.default_model.trim().is_empty() {
            return Err(LecternError::Config(ConfigError::MissingRequired {
                field: "recommendation.default_model".to_string(),
            }));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> LecternError {
    LecternError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}
