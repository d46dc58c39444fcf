//! Borrow status classification
//!
//! Borrow records store free-text status labels (English or Chinese). The
//! composite result keeps them verbatim; this module maps them onto a closed
//! set for filtering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
    OverdueReturned,
    Renewed,
}

impl BorrowStatus {
    pub const ALL: [BorrowStatus; 4] = [
        BorrowStatus::Borrowed,
        BorrowStatus::Returned,
        BorrowStatus::OverdueReturned,
        BorrowStatus::Renewed,
    ];

    /// Canonical English label.
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
            BorrowStatus::OverdueReturned => "overdue-returned",
            BorrowStatus::Renewed => "renewed",
        }
    }

    /// Chinese label used by the catalog's ingestion jobs.
    pub fn zh_label(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "借阅中",
            BorrowStatus::Returned => "已归还",
            BorrowStatus::OverdueReturned => "逾期归还",
            BorrowStatus::Renewed => "已续借",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            BorrowStatus::Borrowed => &["borrowed", "current", "借阅中", "正在借阅", "在借"],
            BorrowStatus::Returned => &["returned", "已归还", "归还", "已还"],
            BorrowStatus::OverdueReturned => &[
                "overdue-returned",
                "returned-overdue",
                "overdue",
                "逾期归还",
                "已逾期",
                "逾期",
            ],
            BorrowStatus::Renewed => &["renewed", "已续借", "续借"],
        }
    }

    /// Map a stored label onto a status, `None` for unrecognised labels.
    pub fn classify(label: &str) -> Option<Self> {
        let needle = label.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|status| status.aliases().contains(&needle.as_str()))
    }
}

impl fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BorrowStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::classify(s).ok_or_else(|| ValidationError::InvalidValue {
            field: "status".to_string(),
            reason: format!("unknown borrow status '{}'", s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_english_and_chinese() {
        assert_eq!(BorrowStatus::classify("returned"), Some(BorrowStatus::Returned));
        assert_eq!(BorrowStatus::classify("已归还"), Some(BorrowStatus::Returned));
        assert_eq!(BorrowStatus::classify(" Borrowed "), Some(BorrowStatus::Borrowed));
        assert_eq!(
            BorrowStatus::classify("逾期归还"),
            Some(BorrowStatus::OverdueReturned)
        );
        assert_eq!(BorrowStatus::classify("lost"), None);
        assert_eq!(BorrowStatus::classify(""), None);
    }

    #[test]
    fn test_labels_classify_to_themselves() {
        for status in BorrowStatus::ALL {
            assert_eq!(BorrowStatus::classify(status.as_str()), Some(status));
            assert_eq!(BorrowStatus::classify(status.zh_label()), Some(status));
        }
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("renewed".parse::<BorrowStatus>().is_ok());
        assert!("misplaced".parse::<BorrowStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_kebab_case() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&BorrowStatus::OverdueReturned)?;
        assert_eq!(json, "\"overdue-returned\"");
        Ok(())
    }
}
