//! Recommendation orchestration.
//!
//! Ties the reader's recent loans, a recommender and the recommendation
//! history table together. Parameter problems are returned as errors. A
//! history lookup that fails is treated as no history; a model that never
//! produced anything, or a history write that failed, yields a response with
//! `success = false`.

use std::time::Instant;

use lectern_core::{
    LecternConfig, RecommendationSettings, RecommendedBook, ValidationError,
};
use lectern_llm::{
    RecommendationClient, RecommendationOutcome, RecommendationRequest, RecommenderKind,
    RecommenderRegistry,
};
use lectern_storage::LibraryQuery;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::telemetry::METRICS;

/// Caller-supplied knobs. Missing values fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct RecommendationParams {
    /// Recommender tag: `ollama` or `gemini`.
    pub model: Option<String>,
    /// Free-text interest keyword.
    pub query: Option<String>,
    /// Number of books wanted.
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecommendationResponse {
    pub success: bool,
    pub reader_id: String,
    pub model_used: String,
    pub query: String,
    /// Whether the reader had any loans to base the prompt on.
    pub has_history: bool,
    pub recommendations_count: usize,
    pub recommendations: Vec<RecommendedBook>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecommendationResponse {
    fn failed(
        reader_id: &str,
        kind: RecommenderKind,
        query: String,
        has_history: bool,
        error: String,
    ) -> Self {
        Self {
            success: false,
            reader_id: reader_id.to_string(),
            model_used: kind.as_str().to_string(),
            query,
            has_history,
            recommendations_count: 0,
            recommendations: Vec::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecommendationService {
    query: LibraryQuery,
    registry: RecommenderRegistry,
    client: RecommendationClient,
    settings: RecommendationSettings,
}

impl RecommendationService {
    pub fn new(
        query: LibraryQuery,
        registry: RecommenderRegistry,
        client: RecommendationClient,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            query,
            registry,
            client,
            settings,
        }
    }

    pub fn from_config(query: LibraryQuery, registry: RecommenderRegistry, config: &LecternConfig) -> Self {
        Self::new(
            query,
            registry,
            RecommendationClient::from_settings(&config.recommendation),
            config.recommendation.clone(),
        )
    }

    pub fn settings(&self) -> &RecommendationSettings {
        &self.settings
    }

    pub fn registry(&self) -> &RecommenderRegistry {
        &self.registry
    }

    /// Produce and persist recommendations for `reader_id`.
    ///
    /// The reader's existence is not checked: an unknown id simply has no
    /// history and gets keyword or generic recommendations.
    pub async fn recommend(
        &self,
        reader_id: &str,
        params: RecommendationParams,
    ) -> ApiResult<RecommendationResponse> {
        let tag = params
            .model
            .as_deref()
            .unwrap_or(self.settings.default_model.as_str());
        let kind = RecommenderKind::from_tag(tag)?;
        let limit = self.validate_limit(params.limit)?;
        let recommender = self.registry.get(kind)?;
        let query = params.query.unwrap_or_default().trim().to_string();

        let recent_books = self
            .query
            .recent_books(reader_id, self.settings.history_window)
            .await?;
        let has_history = !recent_books.is_empty();

        tracing::info!(
            reader_id = %reader_id,
            model = %kind,
            limit,
            has_history,
            has_keyword = !query.is_empty(),
            "Requesting recommendations"
        );

        let started = Instant::now();
        let request = RecommendationRequest {
            recent_books,
            query: query.clone(),
            limit,
        };
        let outcome = self.client.recommend(recommender.as_ref(), &request).await;

        let response = if outcome.is_empty() {
            let error = exhausted_message(&outcome);
            tracing::warn!(reader_id = %reader_id, model = %kind, error = %error, "No recommendations produced");
            observe(kind, "empty", started);
            RecommendationResponse::failed(reader_id, kind, query, has_history, error)
        } else {
            self.persist(reader_id, kind, query, has_history, outcome.items, started)
                .await
        };

        Ok(response)
    }

    async fn persist(
        &self,
        reader_id: &str,
        kind: RecommenderKind,
        query: String,
        has_history: bool,
        items: Vec<RecommendedBook>,
        started: Instant,
    ) -> RecommendationResponse {
        match self
            .query
            .record_recommendations(reader_id, kind.as_str(), &items)
            .await
        {
            Ok(true) => {
                observe(kind, "success", started);
                RecommendationResponse {
                    success: true,
                    reader_id: reader_id.to_string(),
                    model_used: kind.as_str().to_string(),
                    query,
                    has_history,
                    recommendations_count: items.len(),
                    recommendations: items,
                    error: None,
                }
            }
            Ok(false) => {
                observe(kind, "persist_failed", started);
                tracing::warn!(reader_id = %reader_id, "Recommendation history write was not applied");
                RecommendationResponse::failed(
                    reader_id,
                    kind,
                    query,
                    has_history,
                    "failed to save recommendation history".to_string(),
                )
            }
            Err(e) => {
                observe(kind, "persist_failed", started);
                tracing::error!(reader_id = %reader_id, error = %e, "Recommendation history write failed");
                RecommendationResponse::failed(
                    reader_id,
                    kind,
                    query,
                    has_history,
                    format!("failed to save recommendation history: {}", e),
                )
            }
        }
    }

    fn validate_limit(&self, limit: Option<u32>) -> ApiResult<u32> {
        let limit = limit.unwrap_or(self.settings.default_count);
        if limit == 0 || limit > self.settings.max_count {
            return Err(ValidationError::OutOfRange {
                field: "limit".to_string(),
                min: 1,
                max: i64::from(self.settings.max_count),
                value: i64::from(limit),
            }
            .into());
        }
        Ok(limit)
    }
}

fn exhausted_message(outcome: &RecommendationOutcome) -> String {
    match &outcome.last_error {
        Some(e) => format!(
            "no recommendations after {} attempts: {}",
            outcome.attempts, e
        ),
        None => format!("no recommendations after {} attempts", outcome.attempts),
    }
}

fn observe(kind: RecommenderKind, outcome: &str, started: Instant) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_recommendation(kind.as_str(), outcome, started.elapsed().as_secs_f64());
    }
}
