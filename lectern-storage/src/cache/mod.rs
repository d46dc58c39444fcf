//! Bounded recency cache for composite history lookups.
//!
//! [`RecencyCache`] is the plain LRU structure; [`CachedLibraryQuery`]
//! puts it behind a lock in front of any [`crate::HistorySource`].

pub mod history;
pub mod lru;

pub use history::{CacheStats, CachedLibraryQuery, HistoryKey};
pub use lru::RecencyCache;
