//! Request parameter validation shared by the query routes.

use crate::error::{ApiError, ApiResult};

/// Inclusive range check for numeric query parameters.
///
/// # Example
/// ```ignore
/// use lectern_api::validation::ValidateRange;
///
/// let limit = params.limit.unwrap_or(10);
/// limit.validate_range("limit", 1, 200)?;
/// ```
pub trait ValidateRange {
    fn validate_range(&self, field_name: &str, min: i64, max: i64) -> ApiResult<()>;

    /// At least `min`, no upper bound.
    fn validate_min(&self, field_name: &str, min: i64) -> ApiResult<()> {
        self.validate_range(field_name, min, i64::MAX)
    }
}

impl ValidateRange for i64 {
    fn validate_range(&self, field_name: &str, min: i64, max: i64) -> ApiResult<()> {
        if *self < min || *self > max {
            return Err(ApiError::invalid_range(field_name, min, max)
                .with_details(serde_json::json!({
                    "field": field_name,
                    "min": min,
                    "max": max,
                    "value": self,
                })));
        }
        Ok(())
    }
}

/// Rejects blank identifiers.
pub trait ValidateNonEmpty {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        if self.trim().is_empty() {
            return Err(ApiError::invalid_input(format!("{} must not be empty", field_name)));
        }
        Ok(())
    }
}

/// `limit` query parameter: `default` when absent, otherwise `1..=max`.
pub fn resolve_limit(limit: Option<i64>, default: i64, max: i64) -> ApiResult<i64> {
    let limit = limit.unwrap_or(default);
    limit.validate_range("limit", 1, max)?;
    Ok(limit)
}

/// `page` query parameter: 1 when absent, otherwise at least 1.
pub fn resolve_page(page: Option<i64>) -> ApiResult<i64> {
    let page = page.unwrap_or(1);
    page.validate_min("page", 1)?;
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_limit_defaults() {
        assert_eq!(resolve_limit(None, 10, 200).ok(), Some(10));
        assert_eq!(resolve_limit(Some(200), 10, 200).ok(), Some(200));
    }

    #[test]
    fn test_resolve_limit_rejects_out_of_range() {
        for bad in [0, -1, 201] {
            let err = resolve_limit(Some(bad), 10, 200).err();
            assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidRange));
        }
    }

    #[test]
    fn test_resolve_page() {
        assert_eq!(resolve_page(None).ok(), Some(1));
        assert_eq!(resolve_page(Some(7)).ok(), Some(7));
        assert!(resolve_page(Some(0)).is_err());
    }

    #[test]
    fn test_blank_identifier_rejected() {
        assert!("PCSCS19139".validate_non_empty("reader_id").is_ok());
        let err = "  ".validate_non_empty("reader_id").err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidInput));
    }

    proptest! {
        #[test]
        fn prop_limit_accepted_iff_in_range(limit in -50i64..300, max in 1i64..250) {
            let result = resolve_limit(Some(limit), 1, max);
            prop_assert_eq!(result.is_ok(), (1..=max).contains(&limit));
        }
    }
}
