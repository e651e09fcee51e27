use crate::types::DbId;

/// Domain-level error type shared across the workspace.
///
/// The batch-construction pipeline variants (`MalformedCorpus` through
/// `QuotaUnsatisfiable`) abort offline jobs; the agenda/dispatcher variants
/// (`NotAssigned` through `InvalidTimestamp`) are reported to API callers
/// with stable error codes.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed corpus: {0}")]
    MalformedCorpus(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("No donor segment can supply a phrase of length {phrase_len}")]
    DonorTooShort { phrase_len: usize },

    #[error("Document {doc_id} has {len} segments, exceeding the task cap of {cap}")]
    UnpackableDocument {
        doc_id: String,
        len: usize,
        cap: usize,
    },

    #[error("Quota unsatisfiable: {0}")]
    QuotaUnsatisfiable(String),

    #[error("Task {task} is not assigned to user {user}")]
    NotAssigned { user: DbId, task: String },

    #[error("Task {task} is already completed for user {user}")]
    AlreadyCompleted { user: DbId, task: String },

    #[error("Item {item_id} of batch {batch_no} already answered by user {user}")]
    AlreadyAnswered {
        user: DbId,
        batch_no: i32,
        item_id: i32,
    },

    #[error("Invalid timestamps: end {end} precedes start {start}")]
    InvalidTimestamp { start: f64, end: f64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Validate the `(start, end)` timestamp pair attached to a result.
pub fn validate_timestamps(start: f64, end: f64) -> Result<(), CoreError> {
    if !start.is_finite() || !end.is_finite() {
        return Err(CoreError::Validation(
            "timestamps must be finite numbers".to_string(),
        ));
    }
    if end < start {
        return Err(CoreError::InvalidTimestamp { start, end });
    }
    Ok(())
}
