//! API key authentication for operator endpoints.
//!
//! Keys come from `LECTERN_API_KEYS` (comma-separated) and are held as
//! secrets so they never show up in logs or `Debug` output. With no keys
//! configured every protected request is rejected.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::config::env_lookup;
use crate::error::{ApiError, ApiResult};

/// Header carrying the operator credential.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, Default)]
pub struct AuthConfig {
    api_keys: Vec<Arc<SecretString>>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let keys = lookup("LECTERN_API_KEYS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(|k| Arc::new(SecretString::new(k.into())))
                    .collect()
            })
            .unwrap_or_default();
        Self { api_keys: keys }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.add_api_key(key.into());
        self
    }

    pub fn add_api_key(&mut self, key: String) {
        self.api_keys.push(Arc::new(SecretString::new(key.into())));
    }

    pub fn key_count(&self) -> usize {
        self.api_keys.len()
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        !key.is_empty() && self.api_keys.iter().any(|k| k.expose_secret() == key)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format!("[{} keys]", self.api_keys.len()))
            .finish()
    }
}

/// Check a presented key, `Unauthorized` when absent or unknown.
pub fn validate_api_key(config: &AuthConfig, api_key: Option<&str>) -> ApiResult<()> {
    match api_key {
        None => Err(ApiError::unauthorized(
            "Authentication required: provide X-API-Key header",
        )),
        Some(key) if config.is_valid_api_key(key) => Ok(()),
        Some(_) => Err(ApiError::unauthorized("Invalid API key")),
    }
}
