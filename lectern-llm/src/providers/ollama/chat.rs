//! Ollama chat recommender

use super::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::providers::{error_body, invalid_response, request_failed};
use crate::{Recommender, RecommenderKind};
use async_trait::async_trait;
use lectern_core::{LecternResult, OllamaSettings};
use reqwest::Client;

const PROVIDER: &str = "ollama";

/// Recommender backed by a local Ollama server's `/api/chat` endpoint.
pub struct OllamaRecommender {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaRecommender {
    /// # Arguments
    /// * `base_url` - Ollama server URL (e.g., "http://localhost:11434")
    /// * `model` - Model name (e.g., "qwen3:1.7b")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn from_settings(settings: &OllamaSettings) -> Self {
        Self::new(settings.base_url.clone(), settings.model.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Recommender for OllamaRecommender {
    fn kind(&self) -> RecommenderKind {
        RecommenderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> LecternResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            stream: false,
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(request_failed(PROVIDER, i32::from(status.as_u16()), body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))?;

        Ok(chat.message.content)
    }
}

impl std::fmt::Debug for OllamaRecommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaRecommender")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}
