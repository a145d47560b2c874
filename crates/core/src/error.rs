use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which half of a categorization a lookup was trying to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupTarget {
    Subcategory,
    Payoree,
}

impl LookupTarget {
    fn code(self) -> &'static str {
        match self {
            LookupTarget::Subcategory => "SUBCATEGORY",
            LookupTarget::Payoree => "PAYOREE",
        }
    }
}

impl fmt::Display for LookupTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupTarget::Subcategory => write!(f, "subcategory"),
            LookupTarget::Payoree => write!(f, "payoree"),
        }
    }
}

/// Error codes stored in a transaction's `categorization_error` column.
///
/// Lookup codes carry the pipeline stage that produced the candidate name
/// (`AI`, `CSV`, `KEYWORD`, ...) as a prefix: `AI_PAYOREE_LOOKUP_FAILED`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum CategorizationError {
    #[error("No {target} suggestion was produced ({context})")]
    NoSuggestion { context: String, target: LookupTarget },
    #[error("Suggested {target} does not exist ({context})")]
    LookupFailed { context: String, target: LookupTarget },
    #[error("Multiple subcategories matched the suggested name")]
    MultipleSubcategoriesFound,
    #[error("Multiple payorees matched the suggested name")]
    MultiplePayoreesFound,
    #[error("No categories have been imported")]
    CategoriesNotImported,
    #[error("No payorees have been imported")]
    PayoreesNotImported,
    #[error("Database error during lookup")]
    DatabaseError,
    #[error("Import profile mapping failed")]
    ProfileMappingError,
    #[error("Stored data is inconsistent")]
    DataCorruption,
    #[error("Batch processing failed")]
    BatchProcessingFailed,
    #[error("Learned association data is corrupt")]
    LearnedDataCorrupt,
}

const SYSTEM_CODES: &[(&str, CategorizationError)] = &[
    (
        "MULTIPLE_SUBCATEGORIES_FOUND",
        CategorizationError::MultipleSubcategoriesFound,
    ),
    (
        "MULTIPLE_PAYOREES_FOUND",
        CategorizationError::MultiplePayoreesFound,
    ),
    (
        "CATEGORIES_NOT_IMPORTED",
        CategorizationError::CategoriesNotImported,
    ),
    (
        "PAYOREES_NOT_IMPORTED",
        CategorizationError::PayoreesNotImported,
    ),
    ("DATABASE_ERROR", CategorizationError::DatabaseError),
    (
        "PROFILE_MAPPING_ERROR",
        CategorizationError::ProfileMappingError,
    ),
    ("DATA_CORRUPTION", CategorizationError::DataCorruption),
    (
        "BATCH_PROCESSING_FAILED",
        CategorizationError::BatchProcessingFailed,
    ),
    (
        "LEARNED_DATA_CORRUPT",
        CategorizationError::LearnedDataCorrupt,
    ),
];

impl CategorizationError {
    pub fn no_suggestion(context: &str, target: LookupTarget) -> Self {
        CategorizationError::NoSuggestion {
            context: context.to_string(),
            target,
        }
    }

    pub fn lookup_failed(context: &str, target: LookupTarget) -> Self {
        CategorizationError::LookupFailed {
            context: context.to_string(),
            target,
        }
    }

    /// The persisted code, e.g. `AI_SUBCATEGORY_LOOKUP_FAILED`.
    pub fn code(&self) -> String {
        match self {
            CategorizationError::NoSuggestion { context, target } => {
                format!("{context}_NO_{}_SUGGESTION", target.code())
            }
            CategorizationError::LookupFailed { context, target } => {
                format!("{context}_{}_LOOKUP_FAILED", target.code())
            }
            other => SYSTEM_CODES
                .iter()
                .find(|(_, e)| e == other)
                .map(|(code, _)| code.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, CategorizationError::LookupFailed { .. })
    }

    pub fn is_missing_suggestion(&self) -> bool {
        matches!(self, CategorizationError::NoSuggestion { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown categorization error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for CategorizationError {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((_, err)) = SYSTEM_CODES.iter().find(|(code, _)| *code == s) {
            return Ok(err.clone());
        }

        let suffixes = [
            ("_NO_SUBCATEGORY_SUGGESTION", true, LookupTarget::Subcategory),
            ("_NO_PAYOREE_SUGGESTION", true, LookupTarget::Payoree),
            ("_SUBCATEGORY_LOOKUP_FAILED", false, LookupTarget::Subcategory),
            ("_PAYOREE_LOOKUP_FAILED", false, LookupTarget::Payoree),
        ];
        for (suffix, missing, target) in suffixes {
            if let Some(context) = s.strip_suffix(suffix) {
                if context.is_empty() {
                    break;
                }
                return Ok(if missing {
                    CategorizationError::no_suggestion(context, target)
                } else {
                    CategorizationError::lookup_failed(context, target)
                });
            }
        }

        Err(UnknownErrorCode(s.to_string()))
    }
}
