//! Ollama provider (local models).

pub mod chat;
pub mod types;

pub use chat::OllamaRecommender;
