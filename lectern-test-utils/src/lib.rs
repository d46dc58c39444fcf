//! Lectern Test Utilities
//!
//! Shared test infrastructure for the Lectern workspace:
//! - Scripted recommender standing in for a real model
//! - Proptest generators for readers, books and borrow scenarios
//! - Fixtures for the common catalog scenarios
//! - Assertions for Lectern result and error shapes

// Re-export the in-memory datastore from its source crate
pub use lectern_storage::{InMemoryDatastore, LoanRow};

// Re-export core types for convenience
pub use lectern_core::{
    Book, BorrowRecord, BorrowStatus, ConfigError, HistoryResult, LecternConfig, LecternError,
    LecternResult, LlmError, Reader, RecentBook, RecommendedBook, Statistics, StorageError,
    ValidationError,
};
pub use lectern_llm::{Recommender, RecommenderKind};

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

// ============================================================================
// SCRIPTED RECOMMENDER
// ============================================================================

/// Recommender that replays queued replies and records every prompt.
///
/// Once the queue is empty every call fails with a request error.
#[derive(Debug)]
pub struct ScriptedRecommender {
    kind: RecommenderKind,
    replies: Mutex<VecDeque<LecternResult<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedRecommender {
    pub fn new(kind: RecommenderKind) -> Self {
        Self {
            kind,
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful completion.
    pub fn reply(self, text: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(text.into()));
        }
        self
    }

    /// Queue a failed completion.
    pub fn fail(self, message: impl Into<String>) -> Self {
        let error = LlmError::RequestFailed {
            provider: self.kind.as_str().to_string(),
            status: 503,
            message: message.into(),
        };
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(error.into()));
        }
        self
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// User prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Recommender for ScriptedRecommender {
    fn kind(&self) -> RecommenderKind {
        self.kind
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _system: &str, user: &str) -> LecternResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(user.to_string());
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        next.unwrap_or_else(|| {
            Err(LlmError::RequestFailed {
                provider: self.kind.as_str().to_string(),
                status: 0,
                message: "no scripted reply left".to_string(),
            }
            .into())
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog entities.

    use super::fixtures::{self, BorrowScenario};
    use super::*;
    use proptest::prelude::*;

    /// Reader ids in the catalog's external format.
    pub fn arb_reader_id() -> impl Strategy<Value = String> {
        "[A-Z]{3,5}[0-9]{5}"
    }

    pub fn arb_reader() -> impl Strategy<Value = Reader> {
        (
            arb_reader_id(),
            prop::option::of(prop::sample::select(vec!["计算机学院", "物理学院", "外国语学院"])),
            prop::option::of(prop::sample::select(vec!["本科生", "研究生", "教师"])),
            prop::option::of(2000i32..2025),
            prop::option::of(prop::sample::select(vec!["男", "女"])),
        )
            .prop_map(|(reader_id, department, reader_type, enroll_year, gender)| Reader {
                reader_id,
                department: department.map(str::to_string),
                reader_type: reader_type.map(str::to_string),
                enroll_year,
                gender: gender.map(str::to_string),
            })
    }

    /// Status labels as they appear in borrow records, mixed languages.
    pub fn arb_status_label() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "returned",
            "borrowed",
            "overdue-returned",
            "renewed",
            "已归还",
            "借阅中",
            "逾期归还",
        ])
        .prop_map(str::to_string)
    }

    /// A reader, 1-5 books and up to 24 loans spread over them.
    pub fn arb_borrow_scenario() -> impl Strategy<Value = BorrowScenario> {
        (
            arb_reader(),
            1usize..6,
            prop::collection::vec((0usize..6, arb_status_label(), 0u64..1000), 0..25),
        )
            .prop_map(|(reader, book_count, plan)| {
                let books: Vec<Book> = (1..=book_count)
                    .map(|i| fixtures::book(&format!("B{:06}", i), &format!("书目{}", i), "佚名"))
                    .collect();
                let loans = plan
                    .into_iter()
                    .enumerate()
                    .map(|(i, (book, status, days))| {
                        fixtures::loan(
                            &format!("L{:06}", i + 1),
                            &reader.reader_id,
                            &books[book % book_count].book_id,
                            fixtures::days_after_epoch(days),
                            &status,
                        )
                    })
                    .collect();
                BorrowScenario {
                    readers: vec![reader],
                    books,
                    loans,
                }
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for the common catalog scenarios.

    use super::*;
    use chrono::{Days, NaiveDate};

    /// Reader with three loans over two books.
    pub const SCENARIO_READER_ID: &str = "PCSCS19139";
    /// Reader id that is never present.
    pub const MISSING_READER_ID: &str = "NOSUCH00000";

    /// Readers, books and loans to load into a datastore together.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct BorrowScenario {
        pub readers: Vec<Reader>,
        pub books: Vec<Book>,
        pub loans: Vec<LoanRow>,
    }

    impl BorrowScenario {
        pub fn load_into(&self, store: &InMemoryDatastore) {
            for reader in &self.readers {
                store.add_reader(reader.clone());
            }
            for book in &self.books {
                store.add_book(book.clone());
            }
            for loan in &self.loans {
                store.add_loan(loan.clone());
            }
        }

        pub fn datastore(&self) -> InMemoryDatastore {
            let store = InMemoryDatastore::new();
            self.load_into(&store);
            store
        }

        /// Loans belonging to `reader_id`.
        pub fn loans_of(&self, reader_id: &str) -> Vec<&LoanRow> {
            self.loans.iter().filter(|l| l.reader_id == reader_id).collect()
        }
    }

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
    }

    /// `days` after 2020-01-01.
    pub fn days_after_epoch(days: u64) -> NaiveDate {
        let base = date(2020, 1, 1);
        base.checked_add_days(Days::new(days)).unwrap_or(base)
    }

    pub fn reader(reader_id: &str, department: &str) -> Reader {
        Reader {
            reader_id: reader_id.to_string(),
            department: Some(department.to_string()),
            reader_type: Some("本科生".to_string()),
            enroll_year: Some(2019),
            gender: Some("女".to_string()),
        }
    }

    pub fn book(book_id: &str, title: &str, author: &str) -> Book {
        Book {
            book_id: book_id.to_string(),
            title: Some(title.to_string()),
            author: Some(author.to_string()),
            publisher: Some("清华大学出版社".to_string()),
            publication_year: Some(2018),
            call_no: Some("TP311/12".to_string()),
            language: Some("chi".to_string()),
            doc_type: Some("图书".to_string()),
        }
    }

    /// A loan due 30 days after `borrow_date`. Returned statuses get a
    /// return date; others are still out.
    pub fn loan(
        borrow_id: &str,
        reader_id: &str,
        book_id: &str,
        borrow_date: NaiveDate,
        status: &str,
    ) -> LoanRow {
        let due_date = borrow_date.checked_add_days(Days::new(30));
        let returned = matches!(
            BorrowStatus::classify(status),
            Some(BorrowStatus::Returned | BorrowStatus::OverdueReturned)
        );
        LoanRow {
            borrow_id: borrow_id.to_string(),
            reader_id: reader_id.to_string(),
            book_id: book_id.to_string(),
            borrow_date,
            due_date,
            return_date: if returned {
                borrow_date.checked_add_days(Days::new(20))
            } else {
                None
            },
            status: status.to_string(),
        }
    }

    /// `PCSCS19139`: two books, two loans returned and one returned overdue.
    pub fn reader_scenario() -> BorrowScenario {
        BorrowScenario {
            readers: vec![
                reader(SCENARIO_READER_ID, "计算机学院"),
                reader("PHYSX20001", "物理学院"),
            ],
            books: vec![
                book("B000001", "数据库系统概念", "Abraham Silberschatz"),
                book("B000002", "深入理解计算机系统", "Randal E. Bryant"),
                book("B000003", "量子力学导论", "David J. Griffiths"),
            ],
            loans: vec![
                loan("L000001", SCENARIO_READER_ID, "B000001", date(2023, 9, 1), "returned"),
                loan("L000002", SCENARIO_READER_ID, "B000002", date(2023, 10, 8), "returned"),
                loan(
                    "L000003",
                    SCENARIO_READER_ID,
                    "B000001",
                    date(2023, 11, 15),
                    "overdue-returned",
                ),
                loan("L000004", "PHYSX20001", "B000003", date(2024, 3, 2), "borrowed"),
            ],
        }
    }

    pub fn scenario_datastore() -> InMemoryDatastore {
        reader_scenario().datastore()
    }

    /// Model output with `count` well-formed recommendations wrapped in prose.
    pub fn recommendation_reply(count: usize) -> String {
        let items: Vec<serde_json::Value> = (1..=count)
            .map(|i| {
                serde_json::json!({
                    "title": format!("推荐书目{}", i),
                    "author": format!("作者{}", i),
                    "introduction": "一本好书",
                    "reason": format!("理由{}", i),
                })
            })
            .collect();
        format!(
            "以下是推荐结果：\n{}\n祝阅读愉快。",
            serde_json::Value::Array(items)
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Lectern results.

    use super::*;

    /// Assert that a LecternResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &LecternResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a LecternResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &LecternResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &LecternResult<T>) {
        match result {
            Err(LecternError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &LecternResult<T>) {
        match result {
            Err(LecternError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_provider_not_configured<T: std::fmt::Debug>(result: &LecternResult<T>) {
        match result {
            Err(LecternError::Llm(LlmError::ProviderNotConfigured { .. })) => {}
            other => panic!("Expected ProviderNotConfigured error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &LecternResult<T>) {
        match result {
            Err(LecternError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert the structured not-found shape.
    #[track_caller]
    pub fn assert_reader_not_found(result: &HistoryResult) {
        assert!(!result.success, "Expected success=false, got: {:?}", result);
        assert_eq!(result.message, lectern_core::MESSAGE_READER_NOT_FOUND);
        assert!(result.data.is_none(), "Expected no data, got: {:?}", result.data);
    }

    #[track_caller]
    pub fn assert_statistics_consistent(stats: &Statistics) {
        assert!(stats.is_consistent(), "Inconsistent statistics: {:?}", stats);
    }

    /// Assert records are newest first, ties broken by descending borrow id.
    #[track_caller]
    pub fn assert_newest_first(records: &[BorrowRecord]) {
        for pair in records.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                (a.borrow_date, &a.borrow_id) >= (b.borrow_date, &b.borrow_id),
                "Records out of order: {} ({}) before {} ({})",
                a.borrow_id,
                a.borrow_date,
                b.borrow_id,
                b.borrow_date
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_recommender_replays_in_order() {
        let scripted = ScriptedRecommender::new(RecommenderKind::Ollama)
            .fail("down")
            .reply("[]");
        assert!(scripted.complete("s", "first").await.is_err());
        assert!(matches!(scripted.complete("s", "second").await.as_deref(), Ok("[]")));
        assert!(scripted.complete("s", "third").await.is_err());
        assert_eq!(scripted.calls(), 3);
        assert_eq!(scripted.prompts()[1], "second");
    }

    #[test]
    fn test_reader_scenario_shape() {
        let scenario = fixtures::reader_scenario();
        let loans = scenario.loans_of(fixtures::SCENARIO_READER_ID);
        assert_eq!(loans.len(), 3);
        assert!(loans.iter().all(|l| l.return_date.is_some()));
    }

    #[test]
    fn test_recommendation_reply_parses() {
        let items = lectern_llm::parse_recommendations(&fixtures::recommendation_reply(3));
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].reason, "理由3");
    }
}
