//! Lectern LLM - Recommender Providers
//!
//! Book recommendations come from a language model behind the
//! [`Recommender`] capability. This crate holds the two concrete providers
//! (Ollama and Gemini), the prompt builder, the best-effort output parser
//! and the bounded-retry [`RecommendationClient`].
//!
//! Providers are selected by tag through a [`RecommenderRegistry`]; an
//! unknown tag is a configuration error, a known but unregistered one is
//! reported as not configured.

pub mod client;
pub mod parse;
pub mod prompt;
pub mod providers;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::{ConfigError, LecternConfig, LecternError, LecternResult, LlmError};
use serde::{Deserialize, Serialize};

pub use client::{RecommendationClient, RecommendationOutcome, RecommendationRequest};
pub use parse::{parse_recommendations, try_parse};
pub use prompt::{user_prompt, PromptBranch, SYSTEM_PROMPT};
pub use providers::{GeminiRecommender, OllamaRecommender};

// ============================================================================
// RECOMMENDER KIND
// ============================================================================

/// Supported recommender backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommenderKind {
    Ollama,
    Gemini,
}

impl RecommenderKind {
    pub const ALL: [RecommenderKind; 2] = [RecommenderKind::Ollama, RecommenderKind::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommenderKind::Ollama => "ollama",
            RecommenderKind::Gemini => "gemini",
        }
    }

    /// Resolve a caller-supplied tag, ignoring case and surrounding space.
    pub fn from_tag(tag: &str) -> LecternResult<Self> {
        let normalized = tag.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| {
                ConfigError::ProviderNotSupported {
                    provider: tag.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Display for RecommenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommenderKind {
    type Err = LecternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

// ============================================================================
// RECOMMENDER TRAIT
// ============================================================================

/// A model that answers a system + user prompt pair with free text.
#[async_trait]
pub trait Recommender: Send + Sync {
    fn kind(&self) -> RecommenderKind;

    /// Model name sent to the backend.
    fn model(&self) -> &str;

    /// One completion. No retries happen here.
    async fn complete(&self, system: &str, user: &str) -> LecternResult<String>;
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Recommenders by kind.
#[derive(Clone, Default)]
pub struct RecommenderRegistry {
    providers: BTreeMap<RecommenderKind, Arc<dyn Recommender>>,
}

impl RecommenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ollama is always registered; Gemini only when an API key is set.
    pub fn from_config(config: &LecternConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OllamaRecommender::from_settings(&config.ollama)));
        match GeminiRecommender::from_settings(&config.gemini) {
            Some(gemini) => registry.register(Arc::new(gemini)),
            None => tracing::info!("No Gemini API key configured, gemini recommender disabled"),
        }
        registry
    }

    /// Register `provider` under its own kind, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn Recommender>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: RecommenderKind) -> LecternResult<Arc<dyn Recommender>> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            LlmError::ProviderNotConfigured {
                provider: kind.as_str().to_string(),
            }
            .into()
        })
    }

    /// `from_tag` followed by `get`.
    pub fn resolve(&self, tag: &str) -> LecternResult<Arc<dyn Recommender>> {
        self.get(RecommenderKind::from_tag(tag)?)
    }

    pub fn contains(&self, kind: RecommenderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<RecommenderKind> {
        self.providers.keys().copied().collect()
    }
}

impl fmt::Debug for RecommenderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommenderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
