//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use lectern_core::{LecternConfig, LecternResult};
use lectern_llm::RecommenderRegistry;
use lectern_storage::{CachedLibraryQuery, Datastore, Gateway, LibraryQuery};

use crate::services::RecommendationService;

/// Composite history behind the bounded recency cache.
pub type HistoryCache = CachedLibraryQuery<LibraryQuery>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Uncached reads: single entities, book listings, health checks.
    pub query: LibraryQuery,
    /// Composite history reads. Shared by every request.
    pub cache: Arc<HistoryCache>,
    pub recommendations: Arc<RecommendationService>,
    pub config: Arc<LecternConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the state over any datastore with an explicit recommender set.
    pub fn new(
        store: Arc<dyn Datastore>,
        config: LecternConfig,
        registry: RecommenderRegistry,
    ) -> LecternResult<Self> {
        config.validate()?;
        let query = LibraryQuery::new(Gateway::new(store, config.datastore_policy));
        let cache = HistoryCache::from_settings(query.clone(), &config.cache)?;
        let recommendations = RecommendationService::from_config(query.clone(), registry, &config);

        tracing::info!(
            cache_capacity = config.cache.capacity,
            datastore_policy = ?config.datastore_policy,
            "Application state ready"
        );

        Ok(Self {
            query,
            cache: Arc::new(cache),
            recommendations: Arc::new(recommendations),
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }

    /// Build the state with the recommenders the configuration enables.
    pub fn from_config(store: Arc<dyn Datastore>, config: LecternConfig) -> LecternResult<Self> {
        let registry = RecommenderRegistry::from_config(&config);
        Self::new(store, config, registry)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

crate::impl_from_ref!(LibraryQuery, query);
crate::impl_from_ref!(Arc<HistoryCache>, cache);
crate::impl_from_ref!(Arc<RecommendationService>, recommendations);
crate::impl_from_ref!(Arc<LecternConfig>, config);
crate::impl_from_ref!(Instant, start_time);
