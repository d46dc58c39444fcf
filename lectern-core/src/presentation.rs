//! Presentation adapter for composite history results.
//!
//! Output is UTF-8 with non-ASCII text left unescaped. Keys follow struct
//! declaration order and `status_count` is ordered by label, so the same
//! result always renders to the same bytes.

use serde::Serialize;
use serde_json::Value;

use crate::entities::HistoryResult;

/// Transport format for [`present`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Indented, human-readable text.
    #[default]
    Pretty,
    /// Single-line text.
    Compact,
}

/// Render a composite result as text.
pub fn render_history(result: &HistoryResult) -> serde_json::Result<String> {
    present(result, Format::Pretty)
}

/// Render any serializable value in the given format.
pub fn present<T: Serialize>(value: &T, format: Format) -> serde_json::Result<String> {
    match format {
        Format::Pretty => serde_json::to_string_pretty(value),
        Format::Compact => serde_json::to_string(value),
    }
}

/// Structured-object form of a composite result.
pub fn to_object(result: &HistoryResult) -> serde_json::Result<Value> {
    serde_json::to_value(result)
}
