//! Lectern Storage - Query Layer
//!
//! Everything between a caller and the relational store:
//!
//! - [`datastore`]: strict session-based datastore traits
//! - [`gateway`]: the degrading facade callers go through
//! - [`queries`]: SQL statements
//! - [`assembler`]: reader, history, statistics and book queries
//! - [`cache`]: bounded LRU cache over composite histories
//! - [`mock`]: in-memory datastore for tests

pub mod assembler;
pub mod cache;
pub mod datastore;
pub mod gateway;
pub mod mock;
pub mod queries;

pub use assembler::{HistorySource, LibraryQuery};
pub use cache::{CacheStats, CachedLibraryQuery, HistoryKey, RecencyCache};
pub use datastore::{decode_row, decode_rows, Datastore, DatastoreSession, Row, SqlValue};
pub use gateway::{Gateway, GatewaySession};
pub use mock::{InMemoryDatastore, InMemorySession, LoanRow};
