//! Gemini `generateContent` recommender

use super::types::{ApiErrorResponse, Content, GenerateContentRequest, GenerateContentResponse};
use crate::providers::{error_body, invalid_response, request_failed};
use crate::{Recommender, RecommenderKind};
use async_trait::async_trait;
use lectern_core::{GeminiSettings, LecternResult};
use reqwest::Client;

const PROVIDER: &str = "gemini";

/// Recommender backed by the Gemini REST API.
pub struct GeminiRecommender {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiRecommender {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// `None` when no (non-blank) API key is configured.
    pub fn from_settings(settings: &GeminiSettings) -> Option<Self> {
        let key = settings.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some(Self::new(settings.base_url.clone(), settings.model.clone(), key))
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Recommender for GeminiRecommender {
    fn kind(&self) -> RecommenderKind {
        RecommenderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> LecternResult<String> {
        let request = GenerateContentRequest {
            system_instruction: Content::text(None, system),
            contents: vec![Content::text(Some("user"), user)],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(request_failed(PROVIDER, i32::from(status.as_u16()), message));
        }

        let generated: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))?;

        generated
            .text()
            .ok_or_else(|| invalid_response(PROVIDER, "response has no candidate text"))
    }
}

impl std::fmt::Debug for GeminiRecommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiRecommender")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
