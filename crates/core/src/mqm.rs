//! MQM (Multidimensional Quality Metrics) error taxonomy.
//!
//! Error spans are recorded on TGT items and carried opaquely by the
//! dispatcher; this module only validates that submitted span payloads are
//! well formed and use known categories.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum number of MQM spans on a single item submission.
pub const MAX_SPANS_PER_ITEM: usize = 50;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Top-level MQM error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Accuracy,
    Terminology,
    Fluency,
    Style,
    #[serde(rename = "Locale conventions")]
    LocaleConventions,
    #[serde(rename = "Not a translation")]
    NotATranslation,
    Source,
    Other,
}

/// All valid category strings, as they appear on the wire.
const VALID_CATEGORY_STRINGS: &[&str] = &[
    "Accuracy",
    "Terminology",
    "Fluency",
    "Style",
    "Locale conventions",
    "Not a translation",
    "Source",
    "Other",
];

impl ErrorCategory {
    /// Return the category as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accuracy => "Accuracy",
            Self::Terminology => "Terminology",
            Self::Fluency => "Fluency",
            Self::Style => "Style",
            Self::LocaleConventions => "Locale conventions",
            Self::NotATranslation => "Not a translation",
            Self::Source => "Source",
            Self::Other => "Other",
        }
    }

    /// Parse a category from its wire string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "Accuracy" => Ok(Self::Accuracy),
            "Terminology" => Ok(Self::Terminology),
            "Fluency" => Ok(Self::Fluency),
            "Style" => Ok(Self::Style),
            "Locale conventions" => Ok(Self::LocaleConventions),
            "Not a translation" => Ok(Self::NotATranslation),
            "Source" => Ok(Self::Source),
            "Other" => Ok(Self::Other),
            _ => Err(CoreError::Validation(format!(
                "Invalid MQM category '{s}'. Must be one of: {}",
                VALID_CATEGORY_STRINGS.join(", ")
            ))),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

/// One annotated error span on a target segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqmSpan {
    pub category: ErrorCategory,
    /// Optional severity label (e.g. "minor", "major"); stored opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Start offset of the span, in characters.
    pub start: usize,
    /// End offset of the span, exclusive.
    pub end: usize,
}

/// Validate a submitted MQM span payload.
///
/// The JSON must be an array of objects with a known `category` and
/// `start <= end` offsets, at most [`MAX_SPANS_PER_ITEM`] entries.
pub fn validate_span_payload(json: &serde_json::Value) -> Result<(), CoreError> {
    let arr = json.as_array().ok_or_else(|| {
        CoreError::Validation("mqm payload must be a JSON array".to_string())
    })?;

    if arr.len() > MAX_SPANS_PER_ITEM {
        return Err(CoreError::Validation(format!(
            "mqm payload has {} spans, maximum is {MAX_SPANS_PER_ITEM}",
            arr.len()
        )));
    }

    for (i, entry) in arr.iter().enumerate() {
        let span: MqmSpan = serde_json::from_value(entry.clone()).map_err(|e| {
            CoreError::Validation(format!("mqm payload entry {i} is invalid: {e}"))
        })?;
        if span.start > span.end {
            return Err(CoreError::Validation(format!(
                "mqm span {i} has start {} after end {}",
                span.start, span.end
            )));
        }
    }
    Ok(())
}
