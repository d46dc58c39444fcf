//! Service layer: request orchestration that spans more than one crate.

pub mod recommendation;

pub use recommendation::{RecommendationParams, RecommendationResponse, RecommendationService};
