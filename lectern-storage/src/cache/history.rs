//! Recency cache in front of a [`HistorySource`].

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use lectern_core::{
    CacheSettings, ConfigError, HistoryResult, LecternResult, StorageError, ValidationError,
};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use super::lru::RecencyCache;
use crate::assembler::HistorySource;

/// Cache fingerprint: one entry per `(reader_id, limit)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HistoryKey {
    pub reader_id: String,
    pub limit: i64,
}

impl HistoryKey {
    pub fn new(reader_id: impl Into<String>, limit: i64) -> Self {
        Self {
            reader_id: reader_id.into(),
            limit,
        }
    }
}

/// Counters for one cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub evictions: u64,
    pub capacity: u64,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`; zero before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CacheState {
    entries: RecencyCache<HistoryKey, HistoryResult>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Composite-history lookups memoised in a bounded LRU cache.
///
/// Only successful results are stored, so a reader that was not found is
/// looked up again on every call.
///
/// `get` and `clear` run one at a time under `gate`, which is held across the
/// assembly: lookup, populate and evict form one critical section. `state`
/// is only held for bookkeeping so statistics stay readable during a slow
/// assembly.
pub struct CachedLibraryQuery<S> {
    source: S,
    gate: AsyncMutex<()>,
    state: Mutex<CacheState>,
}

impl<S: HistorySource> CachedLibraryQuery<S> {
    /// Wrap `source` with a cache of `capacity` entries.
    pub fn new(source: S, capacity: usize) -> LecternResult<Self> {
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity".to_string(),
                value: "0".to_string(),
                reason: "capacity must be at least 1".to_string(),
            }
            .into());
        }
        Ok(Self {
            source,
            gate: AsyncMutex::new(()),
            state: Mutex::new(CacheState {
                entries: RecencyCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        })
    }

    pub fn from_settings(source: S, settings: &CacheSettings) -> LecternResult<Self> {
        Self::new(source, settings.capacity)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn lock(&self) -> LecternResult<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    /// Cached composite history for `(reader_id, limit)`. `limit` must be
    /// at least 1.
    pub async fn get(&self, reader_id: &str, limit: i64) -> LecternResult<HistoryResult> {
        if limit < 1 {
            return Err(ValidationError::InvalidValue {
                field: "limit".to_string(),
                reason: format!("must be at least 1, got {limit}"),
            }
            .into());
        }
        let key = HistoryKey::new(reader_id, limit);
        let _gate = self.gate.lock().await;

        {
            let mut state = self.lock()?;
            if let Some(hit) = state.entries.get(&key).cloned() {
                state.hits += 1;
                tracing::debug!(reader_id, limit, "History cache hit");
                return Ok(hit);
            }
            state.misses += 1;
        }
        tracing::debug!(reader_id, limit, "History cache miss");

        let result = self.source.composite_history(reader_id, limit).await?;
        if !result.success {
            return Ok(result);
        }

        let mut state = self.lock()?;
        let evicted = state.entries.insert(key, result.clone());
        for (old, _) in &evicted {
            tracing::debug!(reader_id = %old.reader_id, limit = old.limit, "History cache eviction");
        }
        state.evictions += evicted.len() as u64;
        Ok(result)
    }

    pub fn stats(&self) -> LecternResult<CacheStats> {
        let state = self.lock()?;
        Ok(CacheStats {
            hits: state.hits,
            misses: state.misses,
            entry_count: state.entries.len() as u64,
            evictions: state.evictions,
            capacity: state.entries.capacity() as u64,
        })
    }

    /// Drop every entry, keeping the counters. Returns the number removed.
    /// Waits for an in-flight `get` to finish first.
    pub async fn clear(&self) -> LecternResult<usize> {
        let _gate = self.gate.lock().await;
        let removed = self.lock()?.entries.clear();
        tracing::info!(removed, "History cache cleared");
        Ok(removed)
    }

    /// Cached keys, least recently used first.
    pub fn keys(&self) -> LecternResult<Vec<HistoryKey>> {
        Ok(self.lock()?.entries.keys())
    }

    pub fn len(&self) -> LecternResult<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> LecternResult<bool> {
        Ok(self.lock()?.entries.is_empty())
    }

    pub fn contains(&self, reader_id: &str, limit: i64) -> LecternResult<bool> {
        Ok(self
            .lock()?
            .entries
            .contains_key(&HistoryKey::new(reader_id, limit)))
    }
}

#[async_trait]
impl<S: HistorySource> HistorySource for CachedLibraryQuery<S> {
    async fn composite_history(&self, reader_id: &str, limit: i64) -> LecternResult<HistoryResult> {
        self.get(reader_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{CompositeHistory, LecternError, Reader, Statistics};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Source that knows a fixed set of readers and counts assemblies.
    #[derive(Default)]
    struct CountingSource {
        known: Vec<String>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn with_readers(ids: &[&str]) -> Self {
            Self {
                known: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistorySource for Arc<CountingSource> {
        async fn composite_history(
            &self,
            reader_id: &str,
            _limit: i64,
        ) -> LecternResult<HistoryResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.known.iter().any(|k| k == reader_id) {
                return Ok(HistoryResult::not_found());
            }
            Ok(HistoryResult::found(CompositeHistory {
                reader_info: Reader {
                    reader_id: reader_id.to_string(),
                    department: None,
                    reader_type: None,
                    enroll_year: None,
                    gender: None,
                },
                borrow_records: Vec::new(),
                statistics: Statistics::default(),
            }))
        }
    }

    /// Source that parks inside the assembly until released.
    #[derive(Default)]
    struct GatedSource {
        entered: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistorySource for Arc<GatedSource> {
        async fn composite_history(
            &self,
            reader_id: &str,
            _limit: i64,
        ) -> LecternResult<HistoryResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok(HistoryResult::found(CompositeHistory {
                reader_info: Reader {
                    reader_id: reader_id.to_string(),
                    department: None,
                    reader_type: None,
                    enroll_year: None,
                    gender: None,
                },
                borrow_records: Vec::new(),
                statistics: Statistics::default(),
            }))
        }
    }

    fn build(
        readers: &[&str],
        capacity: usize,
    ) -> (Arc<CountingSource>, CachedLibraryQuery<Arc<CountingSource>>) {
        let source = Arc::new(CountingSource::with_readers(readers));
        let cache = CachedLibraryQuery::new(Arc::clone(&source), capacity)
            .unwrap_or_else(|e| panic!("capacity rejected: {e}"));
        (source, cache)
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let source = Arc::new(CountingSource::default());
        assert!(matches!(
            CachedLibraryQuery::new(source, 0),
            Err(LecternError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[tokio::test]
    async fn test_hit_returns_identical_result_without_assembly() -> LecternResult<()> {
        let (source, cache) = build(&["A"], 4);
        let first = cache.get("A", 10).await?;
        let second = cache.get("A", 10).await?;
        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);

        let stats = cache.stats()?;
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn test_limit_is_part_of_the_key() -> LecternResult<()> {
        let (source, cache) = build(&["A"], 4);
        cache.get("A", 10).await?;
        cache.get("A", 5).await?;
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.len()?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_lru_evicts_least_recently_used() -> LecternResult<()> {
        let (source, cache) = build(&["A", "B", "C", "D"], 2);
        cache.get("A", 10).await?;
        cache.get("B", 10).await?;
        cache.get("C", 10).await?;
        // A was evicted by C; re-reading it evicts B.
        cache.get("A", 10).await?;
        assert_eq!(
            cache.keys()?,
            vec![HistoryKey::new("C", 10), HistoryKey::new("A", 10)]
        );

        cache.get("A", 10).await?;
        cache.get("D", 10).await?;
        assert!(cache.contains("A", 10)?);
        assert!(cache.contains("D", 10)?);
        assert!(!cache.contains("C", 10)?);
        assert_eq!(source.calls(), 5);
        assert_eq!(cache.stats()?.evictions, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_recency_order_a_b_access_a_then_d() -> LecternResult<()> {
        let (_, cache) = build(&["A", "B", "D"], 2);
        cache.get("A", 10).await?;
        cache.get("B", 10).await?;
        cache.get("A", 10).await?;
        cache.get("D", 10).await?;
        assert!(cache.contains("A", 10)?);
        assert!(!cache.contains("B", 10)?);
        Ok(())
    }

    #[tokio::test]
    async fn test_not_found_is_never_cached() -> LecternResult<()> {
        let (source, cache) = build(&["A"], 4);
        let first = cache.get("NOSUCH00000", 10).await?;
        let second = cache.get("NOSUCH00000", 10).await?;
        assert!(!first.success);
        assert_eq!(first, second);
        assert_eq!(source.calls(), 2);
        assert!(cache.is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_keeps_counters() -> LecternResult<()> {
        let (source, cache) = build(&["A", "B"], 4);
        cache.get("A", 10).await?;
        cache.get("B", 10).await?;
        assert_eq!(cache.clear().await?, 2);
        assert!(cache.is_empty()?);
        assert_eq!(cache.stats()?.misses, 2);

        cache.get("A", 10).await?;
        assert_eq!(source.calls(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_callers_stay_within_capacity() -> LecternResult<()> {
        let ids: Vec<String> = (0..32).map(|i| format!("R{i:02}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (_, cache) = build(&refs, 8);
        let cache = Arc::new(cache);

        let mut tasks = Vec::new();
        for id in ids.clone() {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move { cache.get(&id, 10).await }));
        }
        for task in tasks {
            let result = task
                .await
                .unwrap_or_else(|e| panic!("task panicked: {e}"))?;
            assert!(result.success);
        }
        assert_eq!(cache.len()?, 8);
        assert_eq!(cache.stats()?.evictions, 24);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_positive_limit_is_rejected() {
        let (source, cache) = build(&["A"], 4);
        for limit in [0, -1] {
            assert!(matches!(
                cache.get("A", limit).await,
                Err(LecternError::Validation(ValidationError::InvalidValue { .. }))
            ));
        }
        assert_eq!(source.calls(), 0);
        assert!(cache.is_empty().unwrap_or(false));
    }

    #[tokio::test]
    async fn test_clear_during_miss_leaves_cache_empty() -> LecternResult<()> {
        let source = Arc::new(GatedSource::default());
        let cache = Arc::new(CachedLibraryQuery::new(Arc::clone(&source), 4)?);

        let miss = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("A", 10).await }
        });
        source.entered.notified().await;

        let clear = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.clear().await }
        });
        tokio::task::yield_now().await;
        assert!(!clear.is_finished());

        source.release.notify_one();
        let result = miss.await.unwrap_or_else(|e| panic!("miss panicked: {e}"))?;
        assert!(result.success);
        let removed = clear.await.unwrap_or_else(|e| panic!("clear panicked: {e}"))?;
        assert_eq!(removed, 1);
        assert!(cache.is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_misses_on_one_key_assemble_once() -> LecternResult<()> {
        let source = Arc::new(GatedSource::default());
        let cache = Arc::new(CachedLibraryQuery::new(Arc::clone(&source), 4)?);

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("A", 10).await }
        });
        source.entered.notified().await;
        let second = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("A", 10).await }
        });
        tokio::task::yield_now().await;
        source.release.notify_one();

        let a = first.await.unwrap_or_else(|e| panic!("first panicked: {e}"))?;
        let b = second.await.unwrap_or_else(|e| panic!("second panicked: {e}"))?;
        assert_eq!(a, b);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats()?;
        assert_eq!((stats.hits, stats.misses), (1, 1));
        Ok(())
    }
}
