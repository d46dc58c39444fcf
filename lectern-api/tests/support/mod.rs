//! Shared helpers for the router tests: the real router over the in-memory
//! datastore and a scripted recommender.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use lectern_api::{create_api_router, ApiConfig, AppState, AuthConfig, API_KEY_HEADER};
use lectern_core::LecternConfig;
use lectern_llm::{RecommenderKind, RecommenderRegistry};
use lectern_test_utils::fixtures::scenario_datastore;
use lectern_test_utils::{InMemoryDatastore, ScriptedRecommender};
use serde_json::Value;
use tower::ServiceExt;

pub const OPERATOR_KEY: &str = "operator-key-123";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryDatastore>,
    pub model: Arc<ScriptedRecommender>,
}

impl TestApp {
    /// Scenario datastore, default configuration, Ollama only.
    pub fn new(model: ScriptedRecommender) -> Self {
        Self::with_config(scenario_datastore(), model, LecternConfig::default())
    }

    pub fn with_config(store: InMemoryDatastore, model: ScriptedRecommender, config: LecternConfig) -> Self {
        let store = Arc::new(store);
        let model = Arc::new(model);

        let mut registry = RecommenderRegistry::new();
        registry.register(model.clone());

        let state = match AppState::new(store.clone(), config, registry) {
            Ok(state) => state,
            Err(e) => panic!("test state rejected: {}", e),
        };
        let auth = AuthConfig::default().with_api_key(OPERATOR_KEY);
        let router = create_api_router(state, &ApiConfig::default(), auth);

        Self { router, store, model }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn send(&self, method: Method, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let request = match builder.body(Body::empty()) {
            Ok(request) => request,
            Err(e) => panic!("bad test request {}: {}", uri, e),
        };

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(e) => match e {},
        };
        let status = response.status();
        let bytes = match to_bytes(response.into_body(), usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => panic!("unreadable body for {}: {}", uri, e),
        };
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }
}

pub fn ollama() -> ScriptedRecommender {
    ScriptedRecommender::new(RecommenderKind::Ollama)
}
