//! Bounded-retry recommendation client.

use std::time::Duration;

use lectern_core::{LecternError, LlmError, RecentBook, RecommendationSettings, RecommendedBook};
use tokio::time::timeout;

use crate::parse::try_parse;
use crate::prompt::{user_prompt, SYSTEM_PROMPT};
use crate::Recommender;

/// What to ask the model for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub recent_books: Vec<RecentBook>,
    pub query: String,
    pub limit: u32,
}

/// Result of a bounded sequence of attempts.
#[derive(Debug, Clone)]
pub struct RecommendationOutcome {
    /// Empty when every attempt failed.
    pub items: Vec<RecommendedBook>,
    /// Attempts actually made.
    pub attempts: u32,
    /// Failure of the last attempt, if no attempt succeeded.
    pub last_error: Option<LecternError>,
}

impl RecommendationOutcome {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Runs strictly sequential attempts against one recommender, each under
/// its own timeout. Transport errors, timeouts and output without a usable
/// array all count as failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationClient {
    attempts: u32,
    attempt_timeout: Duration,
}

impl RecommendationClient {
    pub fn new(attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            attempt_timeout,
        }
    }

    pub fn from_settings(settings: &RecommendationSettings) -> Self {
        Self::new(settings.attempts, settings.attempt_timeout)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub async fn recommend(
        &self,
        recommender: &dyn Recommender,
        request: &RecommendationRequest,
    ) -> RecommendationOutcome {
        let prompt = user_prompt(&request.recent_books, &request.query, request.limit);
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            match self.attempt(recommender, &prompt, request.limit).await {
                Ok(items) => {
                    tracing::debug!(
                        provider = %recommender.kind(),
                        attempt,
                        count = items.len(),
                        "Recommendation attempt succeeded"
                    );
                    return RecommendationOutcome {
                        items,
                        attempts: attempt,
                        last_error: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %recommender.kind(),
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Recommendation attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        RecommendationOutcome {
            items: Vec::new(),
            attempts: self.attempts,
            last_error,
        }
    }

    async fn attempt(
        &self,
        recommender: &dyn Recommender,
        prompt: &str,
        limit: u32,
    ) -> Result<Vec<RecommendedBook>, LecternError> {
        let text = timeout(self.attempt_timeout, recommender.complete(SYSTEM_PROMPT, prompt))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: recommender.kind().as_str().to_string(),
                timeout: self.attempt_timeout,
            })??;

        let mut items = try_parse(&text)?;
        if items.is_empty() {
            return Err(LlmError::MalformedOutput {
                reason: "recommendation list is empty".to_string(),
            }
            .into());
        }
        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(items)
    }
}

impl Default for RecommendationClient {
    fn default() -> Self {
        Self::from_settings(&RecommendationSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecommenderKind;
    use async_trait::async_trait;
    use lectern_core::LecternResult;
    use std::sync::Mutex;

    /// Replays canned replies in order; `None` means a transport error and
    /// `Some("sleep")` hangs past any reasonable timeout.
    struct Replay {
        replies: Mutex<Vec<Option<&'static str>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Replay {
        fn new(replies: Vec<Option<&'static str>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().map(|p| p.len()).unwrap_or(0)
        }
    }

    #[async_trait]
    impl Recommender for Replay {
        fn kind(&self) -> RecommenderKind {
            RecommenderKind::Ollama
        }

        fn model(&self) -> &str {
            "replay"
        }

        async fn complete(&self, _system: &str, user: &str) -> LecternResult<String> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(user.to_string());
            }
            let next = self
                .replies
                .lock()
                .ok()
                .and_then(|mut r| (!r.is_empty()).then(|| r.remove(0)))
                .flatten();
            match next {
                Some("sleep") => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
                Some(text) => Ok(text.to_string()),
                None => Err(LlmError::RequestFailed {
                    provider: "ollama".to_string(),
                    status: 500,
                    message: "boom".to_string(),
                }
                .into()),
            }
        }
    }

    const GOOD: &str = r#"[{"title": "A", "author": "x"}, {"title": "B", "author": "y"}, {"title": "C", "author": "z"}]"#;

    fn request(limit: u32) -> RecommendationRequest {
        RecommendationRequest {
            recent_books: vec![RecentBook {
                title: "三体".to_string(),
                author: "刘慈欣".to_string(),
            }],
            query: String::new(),
            limit,
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let replay = Replay::new(vec![Some(GOOD)]);
        let outcome = RecommendationClient::new(2, Duration::from_secs(5))
            .recommend(&replay, &request(5))
            .await;
        assert_eq!(outcome.items.len(), 3);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.last_error.is_none());
        assert_eq!(replay.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_after_transport_error() {
        let replay = Replay::new(vec![None, Some(GOOD)]);
        let outcome = RecommendationClient::new(2, Duration::from_secs(5))
            .recommend(&replay, &request(2))
            .await;
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.items.len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_empty_with_last_error() {
        let replay = Replay::new(vec![None, Some("I cannot help with that")]);
        let outcome = RecommendationClient::new(2, Duration::from_secs(5))
            .recommend(&replay, &request(5))
            .await;
        assert!(outcome.is_empty());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(replay.calls(), 2);
        assert!(matches!(
            outcome.last_error,
            Some(LecternError::Llm(LlmError::MalformedOutput { .. }))
        ));
    }

    #[tokio::test]
    async fn test_empty_array_counts_as_failure() {
        let replay = Replay::new(vec![Some("[]"), Some("[]"), Some("[]")]);
        let outcome = RecommendationClient::new(3, Duration::from_secs(5))
            .recommend(&replay, &request(5))
            .await;
        assert!(outcome.is_empty());
        assert_eq!(replay.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let replay = Replay::new(vec![Some("sleep"), Some(GOOD)]);
        let outcome = RecommendationClient::new(2, Duration::from_secs(1))
            .recommend(&replay, &request(5))
            .await;
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.items.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_on_last_attempt_is_reported() {
        let replay = Replay::new(vec![Some("sleep")]);
        let outcome = RecommendationClient::new(1, Duration::from_secs(1))
            .recommend(&replay, &request(5))
            .await;
        assert!(matches!(
            outcome.last_error,
            Some(LecternError::Llm(LlmError::Timeout { .. }))
        ));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RecommendationClient::new(0, Duration::from_secs(1)).attempts(), 1);
        assert_eq!(RecommendationClient::default().attempts(), 2);
    }
}
