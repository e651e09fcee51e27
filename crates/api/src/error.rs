use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mteval_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `mteval_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Resolve the HTTP status, stable error code, and client message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::MalformedCorpus(msg) => {
                    (StatusCode::BAD_REQUEST, "MALFORMED_CORPUS", msg.clone())
                }
                CoreError::Encoding(msg) => {
                    (StatusCode::BAD_REQUEST, "ENCODING_ERROR", msg.clone())
                }
                CoreError::DonorTooShort { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "DONOR_TOO_SHORT",
                    core.to_string(),
                ),
                CoreError::UnpackableDocument { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "UNPACKABLE_DOCUMENT",
                    core.to_string(),
                ),
                CoreError::QuotaUnsatisfiable(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "QUOTA_UNSATISFIABLE",
                    msg.clone(),
                ),
                CoreError::NotAssigned { .. } => {
                    (StatusCode::FORBIDDEN, "NOT_ASSIGNED", core.to_string())
                }
                CoreError::AlreadyCompleted { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_COMPLETED", core.to_string())
                }
                CoreError::AlreadyAnswered { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_ANSWERED", core.to_string())
                }
                CoreError::InvalidTimestamp { .. } => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_TIMESTAMP",
                    core.to_string(),
                ),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Detect a duplicate-result insert and convert it to the domain error.
pub fn map_duplicate_result(
    err: sqlx::Error,
    user: mteval_core::types::DbId,
    batch_no: i32,
    item_id: i32,
) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505")
            && db_err.constraint() == Some("uq_results_user_batch_item")
        {
            return AppError::Core(CoreError::AlreadyAnswered {
                user,
                batch_no,
                item_id,
            });
        }
    }
    AppError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> (StatusCode, &'static str) {
        let (status, code, _) = err.parts();
        (status, code)
    }

    #[test]
    fn not_assigned_is_forbidden() {
        let err = AppError::Core(CoreError::NotAssigned {
            user: 1,
            task: "Batch:3".to_string(),
        });
        assert_eq!(status_of(err), (StatusCode::FORBIDDEN, "NOT_ASSIGNED"));
    }

    #[test]
    fn already_answered_is_conflict() {
        let err = AppError::Core(CoreError::AlreadyAnswered {
            user: 1,
            batch_no: 2,
            item_id: 3,
        });
        assert_eq!(status_of(err), (StatusCode::CONFLICT, "ALREADY_ANSWERED"));
    }

    #[test]
    fn already_completed_is_conflict() {
        let err = AppError::Core(CoreError::AlreadyCompleted {
            user: 1,
            task: "Batch:2".to_string(),
        });
        assert_eq!(status_of(err), (StatusCode::CONFLICT, "ALREADY_COMPLETED"));
    }

    #[test]
    fn invalid_timestamp_is_bad_request() {
        let err = AppError::Core(CoreError::InvalidTimestamp {
            start: 10.0,
            end: 5.0,
        });
        assert_eq!(
            status_of(err),
            (StatusCode::BAD_REQUEST, "INVALID_TIMESTAMP")
        );
    }

    #[test]
    fn not_found_is_404() {
        let err = AppError::Core(CoreError::NotFound {
            entity: "campaign",
            id: 9,
        });
        assert_eq!(status_of(err), (StatusCode::NOT_FOUND, "NOT_FOUND"));
    }

    #[test]
    fn quota_unsatisfiable_is_unprocessable() {
        let err = AppError::Core(CoreError::QuotaUnsatisfiable("too many".to_string()));
        assert_eq!(
            status_of(err),
            (StatusCode::UNPROCESSABLE_ENTITY, "QUOTA_UNSATISFIABLE")
        );
    }

    #[test]
    fn row_not_found_is_404() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(status_of(err), (StatusCode::NOT_FOUND, "NOT_FOUND"));
    }

    #[test]
    fn internal_message_is_sanitized() {
        let err = AppError::InternalError("connection string leaked".to_string());
        let (_, _, message) = err.parts();
        assert_eq!(message, "An internal error occurred");
    }
}
