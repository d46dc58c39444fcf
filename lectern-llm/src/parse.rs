//! Best-effort extraction of recommendations from model output.
//!
//! The model is asked for a bare JSON array but often wraps it in prose or
//! code fences. The text between the first `[` and the last `]` is taken as
//! the array; entries that are not objects with a title are dropped.

use lectern_core::{LecternResult, LlmError, RecommendedBook};
use serde_json::Value;

fn malformed(reason: impl Into<String>) -> lectern_core::LecternError {
    LlmError::MalformedOutput {
        reason: reason.into(),
    }
    .into()
}

/// Extract the recommendation array, reporting why extraction failed.
pub fn try_parse(text: &str) -> LecternResult<Vec<RecommendedBook>> {
    let start = text
        .find('[')
        .ok_or_else(|| malformed("no '[' in output"))?;
    let end = text
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| malformed("no closing ']' after '['"))?;

    let entries: Vec<Value> = serde_json::from_str(&text[start..=end])
        .map_err(|e| malformed(format!("not a JSON array: {e}")))?;

    Ok(entries
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|entry| serde_json::from_value::<RecommendedBook>(entry).ok())
        .filter(|book| !book.title.trim().is_empty())
        .collect())
}

/// Like [`try_parse`] but never fails: malformed output yields an empty list.
pub fn parse_recommendations(text: &str) -> Vec<RecommendedBook> {
    try_parse(text).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Discarding unparseable recommender output");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::LecternError;

    #[test]
    fn test_extracts_array_from_surrounding_text() -> LecternResult<()> {
        let text = r#"好的，以下是推荐：
```json
[{"title": "深入理解计算机系统", "author": "Randal E. Bryant", "introduction": "经典", "reason": "系统基础"}]
```"#;
        let books = try_parse(text)?;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "深入理解计算机系统");
        assert_eq!(books[0].reason, "系统基础");
        Ok(())
    }

    #[test]
    fn test_missing_fields_default_to_empty() -> LecternResult<()> {
        let books = try_parse(r#"[{"title": "算法导论"}]"#)?;
        assert_eq!(books[0].author, "");
        assert_eq!(books[0].introduction, "");
        Ok(())
    }

    #[test]
    fn test_drops_entries_without_title() -> LecternResult<()> {
        let books = try_parse(r#"[{"title": ""}, "noise", 3, {"title": "SICP", "author": "Abelson"}]"#)?;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].author, "Abelson");
        Ok(())
    }

    #[test]
    fn test_malformed_output_is_reported() {
        for text in ["", "no brackets here", "] backwards [", "[{\"title\": }]"] {
            assert!(
                matches!(
                    try_parse(text),
                    Err(LecternError::Llm(LlmError::MalformedOutput { .. }))
                ),
                "expected failure for {:?}",
                text
            );
            assert!(parse_recommendations(text).is_empty());
        }
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_never_panics(text in ".{0,200}") {
                let _ = parse_recommendations(&text);
            }

            #[test]
            fn prop_survives_prose_around_array(
                prefix in "[^\\[\\]]{0,40}",
                suffix in "[^\\[\\]]{0,40}",
                title in "[a-zA-Z\u{4e00}-\u{4e2f}]{1,12}",
            ) {
                let body = serde_json::json!([{"title": title, "author": "x"}]).to_string();
                let text = format!("{prefix}{body}{suffix}");
                let books = parse_recommendations(&text);
                prop_assert_eq!(books.len(), 1);
                prop_assert_eq!(&books[0].title, &title);
            }
        }
    }
}
