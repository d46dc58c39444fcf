//! Lectern Core - Catalog Types
//!
//! Data types, error taxonomy and configuration shared by every Lectern
//! crate. No I/O happens here.

pub mod config;
pub mod entities;
pub mod error;
pub mod presentation;
pub mod status;

pub use config::{
    CacheSettings, DatastorePolicy, GeminiSettings, HistorySettings, LecternConfig,
    OllamaSettings, RecommendationSettings,
};
pub use entities::{
    total_pages, Book, BookPage, BookSearch, BorrowRecord, BorrowedBook, BorrowerSummary,
    CompositeHistory, HistoryResult, Reader, RecentBook, RecommendationRecord, RecommendedBook,
    SortField, SortOrder, Statistics, MESSAGE_OK, MESSAGE_READER_NOT_FOUND,
};
pub use error::{ConfigError, LecternError, LecternResult, LlmError, StorageError, ValidationError};
pub use presentation::{present, render_history, to_object, Format};
pub use status::BorrowStatus;
